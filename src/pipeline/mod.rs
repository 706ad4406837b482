//! The analysis pipeline.
//!
//! Sequences the three stages for one request - specialist fan-out,
//! supervisor review with bounded rework, and final synthesis - and
//! attaches audit events at every transition. Each request owns its
//! entire working state; concurrent requests share only the provider,
//! the casebook, and the audit sink, all read-only.

pub mod review;
pub mod specialist;
pub mod structured;
pub mod synthesis;

#[cfg(test)]
pub(crate) mod testing;

use crate::audit::{AuditSink, AuditTrail, EventKind};
use crate::casebook::ExampleRetriever;
use crate::error::PipelineError;
use crate::models::{AnalysisTask, FinalAnalysis, ReviewedReport};
use crate::provider::ReasoningProvider;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum rework attempts per specialist.
    pub max_rework: usize,
    /// Few-shot examples injected into each specialist prompt.
    pub examples_per_specialist: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_rework: 1,
            examples_per_specialist: 5,
        }
    }
}

/// The pipeline coordinator.
pub struct Pipeline {
    provider: Arc<dyn ReasoningProvider>,
    retriever: Arc<dyn ExampleRetriever>,
    audit_sink: Arc<dyn AuditSink>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        retriever: Arc<dyn ExampleRetriever>,
        audit_sink: Arc<dyn AuditSink>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            provider,
            retriever,
            audit_sink,
            options,
        }
    }

    /// Run the full analysis for one task.
    ///
    /// Returns the consolidated analysis, or a `PipelineError` for the
    /// two user-visible failure classes. Stage-level provider and parse
    /// failures are absorbed by each stage's degraded-output policy and
    /// never surface here.
    pub async fn run_analysis(&self, task: AnalysisTask) -> Result<FinalAnalysis, PipelineError> {
        self.run_with_id(Uuid::new_v4().to_string(), task).await
    }

    /// Run the full analysis under a caller-supplied request id, so the
    /// caller can correlate the result with the persisted audit trail.
    pub async fn run_with_id(
        &self,
        request_id: String,
        task: AnalysisTask,
    ) -> Result<FinalAnalysis, PipelineError> {
        let started = Instant::now();

        let mut trail = AuditTrail::start(
            request_id.clone(),
            json!({"responses": task.responses()}),
        );
        trail.record(EventKind::RequestReceived, None, None, json!({}));

        info!("[{}] Starting analysis pipeline", request_id);

        let result = self.run_stages(&task, &mut trail).await;

        match result {
            Ok(analysis) => {
                let duration = started.elapsed().as_secs_f64();
                trail.finalize(
                    serde_json::to_value(&analysis).unwrap_or(json!(null)),
                    duration,
                );
                self.persist_trail(&trail);

                info!(
                    "[{}] Pipeline complete in {:.1}s: score {:.1}, level {}",
                    request_id, duration, analysis.final_score, analysis.risk_level
                );
                Ok(analysis)
            }
            Err(e) => {
                error!("[{}] Pipeline failed: {}", request_id, e);
                trail.record(
                    EventKind::Error,
                    None,
                    None,
                    json!({"error": e.to_string()}),
                );
                trail.finalize(json!({"error": e.to_string()}), started.elapsed().as_secs_f64());
                self.persist_trail(&trail);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        task: &AnalysisTask,
        trail: &mut AuditTrail,
    ) -> Result<FinalAnalysis, PipelineError> {
        // Stage 1: specialist fan-out
        let reports = specialist::analyze_all(
            task,
            Arc::clone(&self.provider),
            Arc::clone(&self.retriever),
            self.options.examples_per_specialist,
        )
        .await;

        for report in &reports {
            trail.record(
                EventKind::SpecialistResult,
                Some(report.specialist_id),
                None,
                serde_json::to_value(report).unwrap_or(json!(null)),
            );
        }

        // Stage 2: review with bounded rework. Events from the five
        // concurrent loops are collected per loop and appended to the
        // trail afterwards, keeping each specialist's attempts in order.
        let reviewed = self.review_stage(reports, task, trail).await;

        for item in &reviewed {
            if !item.approved() {
                warn!(
                    "Specialist {} exhausted rework attempts without approval",
                    item.report.specialist_id
                );
            }
        }

        // Stage 3: synthesis
        let final_reports: Vec<_> = reviewed.iter().map(|r| r.report.clone()).collect();
        let analysis = synthesis::synthesize(final_reports, self.provider.as_ref()).await;

        trail.record(
            EventKind::FinalSynthesis,
            None,
            None,
            json!({
                "final_score": analysis.final_score,
                "risk_level": analysis.risk_level,
                "factors": analysis.consolidated_factors.len(),
            }),
        );

        Ok(analysis)
    }

    /// Run the five review loops concurrently, recording each loop's
    /// events into the trail once all loops settle.
    async fn review_stage(
        &self,
        reports: Vec<crate::models::SpecialistReport>,
        task: &AnalysisTask,
        trail: &mut AuditTrail,
    ) -> Vec<ReviewedReport> {
        let loops = reports.into_iter().map(|report| {
            let provider = Arc::clone(&self.provider);
            let retriever = Arc::clone(&self.retriever);
            let user_response = task.response_for(report.specialist_id).to_string();
            let examples = self.options.examples_per_specialist;
            let max_rework = self.options.max_rework;

            async move {
                let specialist_id = report.specialist_id;
                let mut events = Vec::new();
                let reviewed = review::review_report(
                    report,
                    &user_response,
                    provider.as_ref(),
                    retriever.as_ref(),
                    examples,
                    max_rework,
                    |event| match event {
                        review::ReviewEvent::Feedback { attempt, feedback } => events.push((
                            EventKind::ReviewFeedback,
                            attempt,
                            serde_json::to_value(feedback).unwrap_or(json!(null)),
                        )),
                        review::ReviewEvent::Rework { attempt, report } => events.push((
                            EventKind::ReworkAttempt,
                            attempt,
                            serde_json::to_value(report).unwrap_or(json!(null)),
                        )),
                    },
                )
                .await;
                (specialist_id, events, reviewed)
            }
        });

        let settled = futures::future::join_all(loops).await;

        settled
            .into_iter()
            .map(|(specialist_id, events, reviewed)| {
                for (kind, attempt, payload) in events {
                    trail.record(kind, Some(specialist_id), Some(attempt), payload);
                }
                reviewed
            })
            .collect()
    }

    fn persist_trail(&self, trail: &AuditTrail) {
        if let Err(e) = self.audit_sink.persist(trail) {
            // Audit failures never abort the pipeline.
            warn!("Failed to persist audit trail {}: {}", trail.request_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::models::{RiskLevel, SPECIALIST_COUNT};
    use crate::pipeline::testing::{NullRetriever, RoleProvider};

    fn specialist_json(score: f64) -> String {
        format!(
            r#"{{"specialist_id": 1, "domain": "d", "analysis": "a", "preliminary_score": {}, "risk_factors": [{{"factor": "f", "severity": "Medium", "description": "x"}}], "justification": "j"}}"#,
            score
        )
    }

    fn approval_json() -> String {
        r#"{"status": "APPROVED", "specialist_id": 1}"#.to_string()
    }

    fn synthesis_json(score: f64, level: &str) -> String {
        format!(
            r#"{{"final_score": {}, "risk_level": "{}", "consolidated_factors": [], "synthesis": "s", "recommendations": ["r"]}}"#,
            score, level
        )
    }

    fn happy_pipeline(sink: Arc<MemoryAuditSink>) -> Pipeline {
        Pipeline::new(
            Arc::new(RoleProvider {
                specialist: specialist_json(40.0),
                supervisor: approval_json(),
                synthesizer: synthesis_json(45.0, "Medium"),
            }),
            Arc::new(NullRetriever),
            sink,
            PipelineOptions::default(),
        )
    }

    fn task() -> AnalysisTask {
        AnalysisTask::new((1..=5).map(|i| format!("response {}", i)).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_full_pipeline_returns_five_ordered_reports() {
        let sink = Arc::new(MemoryAuditSink::new());
        let pipeline = happy_pipeline(Arc::clone(&sink));

        let analysis = pipeline.run_analysis(task()).await.unwrap();

        assert_eq!(analysis.final_score, 45.0);
        assert_eq!(analysis.risk_level, RiskLevel::Medium);
        assert_eq!(analysis.specialist_reports.len(), SPECIALIST_COUNT);
        for (idx, report) in analysis.specialist_reports.iter().enumerate() {
            assert_eq!(report.specialist_id as usize, idx + 1);
        }
    }

    #[tokio::test]
    async fn test_audit_trail_shape() {
        let sink = Arc::new(MemoryAuditSink::new());
        let pipeline = happy_pipeline(Arc::clone(&sink));

        pipeline.run_analysis(task()).await.unwrap();

        let trails = sink.trails.lock().unwrap();
        assert_eq!(trails.len(), 1);
        let trail = &trails[0];

        assert!(trail.duration_seconds.is_some());
        assert!(trail.response.is_some());

        let kinds: Vec<EventKind> = trail.events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds[0], EventKind::RequestReceived);
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::SpecialistResult).count(),
            SPECIALIST_COUNT
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::ReviewFeedback).count(),
            SPECIALIST_COUNT
        );
        assert_eq!(*kinds.last().unwrap(), EventKind::FinalSynthesis);
    }

    #[tokio::test]
    async fn test_degraded_provider_still_completes() {
        // Provider returns garbage everywhere: specialists fall back to
        // placeholders, review fails open, synthesis computes the mean.
        let sink = Arc::new(MemoryAuditSink::new());
        let pipeline = Pipeline::new(
            Arc::new(RoleProvider {
                specialist: "garbage".to_string(),
                supervisor: "garbage".to_string(),
                synthesizer: "garbage".to_string(),
            }),
            Arc::new(NullRetriever),
            sink,
            PipelineOptions::default(),
        );

        let analysis = pipeline.run_analysis(task()).await.unwrap();

        // Five placeholders at 50.0 each -> mean 50.0, Medium band.
        assert_eq!(analysis.final_score, 50.0);
        assert_eq!(analysis.risk_level, RiskLevel::Medium);
        assert_eq!(analysis.specialist_reports.len(), SPECIALIST_COUNT);
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_cross_contaminate() {
        let sink = Arc::new(MemoryAuditSink::new());
        let pipeline = happy_pipeline(Arc::clone(&sink));

        let task_a =
            AnalysisTask::new((1..=5).map(|i| format!("A-{}", i)).collect()).unwrap();
        let task_b =
            AnalysisTask::new((1..=5).map(|i| format!("B-{}", i)).collect()).unwrap();

        let (a, b) = tokio::join!(
            pipeline.run_analysis(task_a),
            pipeline.run_analysis(task_b),
        );
        a.unwrap();
        b.unwrap();

        let trails = sink.trails.lock().unwrap();
        assert_eq!(trails.len(), 2);
        assert_ne!(trails[0].request_id, trails[1].request_id);

        // Each trail's request payload holds only its own responses.
        for trail in trails.iter() {
            let responses = trail.request_payload["responses"].as_array().unwrap();
            let prefix = responses[0].as_str().unwrap().chars().next().unwrap();
            assert!(responses
                .iter()
                .all(|r| r.as_str().unwrap().starts_with(prefix)));
        }
    }

    #[tokio::test]
    async fn test_failing_audit_sink_does_not_abort() {
        struct FailingSink;
        impl AuditSink for FailingSink {
            fn persist(&self, _trail: &AuditTrail) -> anyhow::Result<()> {
                anyhow::bail!("disk full")
            }
        }

        let pipeline = Pipeline::new(
            Arc::new(RoleProvider {
                specialist: specialist_json(40.0),
                supervisor: approval_json(),
                synthesizer: synthesis_json(45.0, "Medium"),
            }),
            Arc::new(NullRetriever),
            Arc::new(FailingSink),
            PipelineOptions::default(),
        );

        assert!(pipeline.run_analysis(task()).await.is_ok());
    }
}
