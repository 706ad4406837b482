//! Specialist fan-out stage.
//!
//! Runs the five domain specialists concurrently, one per questionnaire
//! response. Every per-item failure - provider, retrieval, or parsing -
//! degrades to a placeholder report, so downstream stages always receive
//! exactly five reports in specialist-id order. The stage never errors
//! outward.

use crate::casebook::ExampleRetriever;
use crate::error::ParseError;
use crate::models::{domain_label, specialist_ids, AnalysisTask, SpecialistReport};
use crate::pipeline::structured::decode_structured;
use crate::prompts;
use crate::provider::ReasoningProvider;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decode and sanity-check a specialist's structured response.
///
/// A score outside 0-100 is treated as a parse failure, the same as a
/// malformed payload.
pub(crate) fn decode_report(response: &str, specialist_id: u8) -> Result<SpecialistReport, ParseError> {
    let mut report: SpecialistReport = decode_structured(response)?;

    if !(0.0..=100.0).contains(&report.preliminary_score) {
        return Err(ParseError {
            reason: format!(
                "preliminary_score {} outside 0-100",
                report.preliminary_score
            ),
            raw: response.to_string(),
        });
    }

    // Keep the report bound to its input slot even if the model echoed
    // the wrong id or domain.
    report.specialist_id = specialist_id;
    report.domain = domain_label(specialist_id).to_string();

    Ok(report)
}

/// Run one specialist over its response. Failures degrade to a
/// placeholder report with a neutral score.
pub async fn analyze_one(
    specialist_id: u8,
    response: &str,
    provider: &dyn ReasoningProvider,
    retriever: &dyn ExampleRetriever,
    examples_count: usize,
) -> SpecialistReport {
    let domain = domain_label(specialist_id);

    let examples = match retriever.examples(specialist_id, examples_count) {
        Ok(examples) => examples,
        Err(e) => {
            warn!("Specialist {}: example retrieval failed: {}", specialist_id, e);
            return SpecialistReport::placeholder(specialist_id, domain, &e.to_string());
        }
    };

    let instructions = prompts::specialist_instructions(specialist_id, domain, &examples);
    let task_text = prompts::analysis_task(response);

    let raw = match provider.invoke(&instructions, &task_text, true).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Specialist {}: provider call failed: {}", specialist_id, e);
            return SpecialistReport::placeholder(specialist_id, domain, &e.to_string());
        }
    };

    match decode_report(&raw, specialist_id) {
        Ok(report) => {
            debug!(
                "Specialist {} scored {:.1} with {} factors",
                specialist_id,
                report.preliminary_score,
                report.risk_factors.len()
            );
            report
        }
        Err(e) => {
            warn!("Specialist {}: unparseable response: {}", specialist_id, e.reason);
            // The justification keeps the raw response for the audit trail.
            SpecialistReport::placeholder(
                specialist_id,
                domain,
                &format!("{} (raw response: {:.500})", e.reason, e.raw),
            )
        }
    }
}

/// Run all five specialists concurrently.
///
/// Returns exactly five reports, ordered by specialist id 1..5.
pub async fn analyze_all(
    task: &AnalysisTask,
    provider: Arc<dyn ReasoningProvider>,
    retriever: Arc<dyn ExampleRetriever>,
    examples_count: usize,
) -> Vec<SpecialistReport> {
    let analyses = specialist_ids().map(|id| {
        let provider = Arc::clone(&provider);
        let retriever = Arc::clone(&retriever);
        async move {
            analyze_one(
                id,
                task.response_for(id),
                provider.as_ref(),
                retriever.as_ref(),
                examples_count,
            )
            .await
        }
    });

    join_all(analyses).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{NullRetriever, ScriptedProvider};
    use crate::models::SPECIALIST_COUNT;

    fn report_json(id: u8, score: f64) -> String {
        format!(
            r#"{{"specialist_id": {}, "domain": "d", "analysis": "a", "preliminary_score": {}, "risk_factors": [], "justification": "j"}}"#,
            id, score
        )
    }

    #[test]
    fn test_decode_report_rejects_out_of_range_score() {
        let err = decode_report(&report_json(1, 140.0), 1).unwrap_err();
        assert!(err.reason.contains("outside 0-100"));
    }

    #[test]
    fn test_decode_report_rebinds_slot() {
        // The model echoed the wrong id; the slot wins.
        let report = decode_report(&report_json(4, 20.0), 2).unwrap();
        assert_eq!(report.specialist_id, 2);
        assert_eq!(report.domain, domain_label(2));
    }

    #[tokio::test]
    async fn test_all_five_reports_in_order() {
        let provider = Arc::new(ScriptedProvider::always(report_json(1, 30.0)));
        let task = AnalysisTask::new(vec!["r".to_string(); 5]).unwrap();

        let reports = analyze_all(&task, provider.clone(), Arc::new(NullRetriever), 5).await;

        assert_eq!(reports.len(), SPECIALIST_COUNT);
        for (idx, report) in reports.iter().enumerate() {
            assert_eq!(report.specialist_id as usize, idx + 1);
        }
        // One provider call per specialist, no retries in this stage.
        assert_eq!(provider.call_count(), SPECIALIST_COUNT);
    }

    #[tokio::test]
    async fn test_single_provider_failure_degrades_to_placeholder() {
        // Specialist 3 hits a provider error, everyone else succeeds.
        let provider = Arc::new(
            ScriptedProvider::always(report_json(1, 30.0)).failing_when(domain_label(3)),
        );
        let task = AnalysisTask::new(vec!["r".to_string(); 5]).unwrap();

        let reports = analyze_all(&task, provider, Arc::new(NullRetriever), 5).await;

        assert_eq!(reports.len(), SPECIALIST_COUNT);
        let placeholders: Vec<_> = reports
            .iter()
            .filter(|r| r.preliminary_score == 50.0 && r.risk_factors.is_empty())
            .collect();
        assert_eq!(placeholders.len(), 1);
        let healthy = reports.iter().filter(|r| r.preliminary_score == 30.0).count();
        assert_eq!(healthy, 4);
    }

    #[tokio::test]
    async fn test_unparseable_response_degrades_to_placeholder() {
        let provider = Arc::new(ScriptedProvider::always("total nonsense".to_string()));
        let task = AnalysisTask::new(vec!["r".to_string(); 5]).unwrap();

        let reports = analyze_all(&task, provider, Arc::new(NullRetriever), 5).await;

        for report in &reports {
            assert_eq!(report.preliminary_score, 50.0);
            assert!(report.justification.contains("total nonsense"));
        }
    }
}
