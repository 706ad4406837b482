//! Supervisor review stage with bounded rework.
//!
//! Each specialist report goes through its own review loop: the
//! supervisor approves it or requests rework, and a rework re-invokes
//! the originating specialist with the previous report and the feedback.
//! The loop is bounded by `max_rework`; a report that is still
//! unapproved when attempts run out is used downstream anyway.
//!
//! Fail-open policies:
//! - an unparseable supervisor verdict counts as an implicit approval;
//! - a failed rework keeps the previous report unchanged.
//!
//! The five loops run concurrently with each other; iterations within one
//! loop are strictly sequential, each depending on the prior feedback.

use crate::casebook::ExampleRetriever;
use crate::models::{domain_label, ReviewFeedback, ReviewedReport, SpecialistReport};
use crate::pipeline::specialist::decode_report;
use crate::pipeline::structured::decode_structured;
use crate::prompts;
use crate::provider::ReasoningProvider;
use tracing::{debug, warn};

/// Events surfaced to the coordinator's audit trail as the loop runs.
pub enum ReviewEvent<'a> {
    Feedback {
        attempt: usize,
        feedback: &'a ReviewFeedback,
    },
    Rework {
        attempt: usize,
        report: &'a SpecialistReport,
    },
}

/// Run the review loop for one specialist report.
///
/// `observe` is called at each review verdict and each rework, in order.
pub async fn review_report(
    report: SpecialistReport,
    user_response: &str,
    provider: &dyn ReasoningProvider,
    retriever: &dyn ExampleRetriever,
    examples_count: usize,
    max_rework: usize,
    mut observe: impl FnMut(ReviewEvent<'_>),
) -> ReviewedReport {
    let specialist_id = report.specialist_id;
    let mut current = report;
    let mut feedback_history = Vec::new();

    for attempt in 0..=max_rework {
        let feedback = request_verdict(&current, provider).await;
        observe(ReviewEvent::Feedback {
            attempt,
            feedback: &feedback,
        });
        let approved = feedback.is_approved();

        if !approved && attempt < max_rework {
            current = rework(
                current,
                &feedback,
                user_response,
                provider,
                retriever,
                examples_count,
            )
            .await;
            observe(ReviewEvent::Rework {
                attempt: attempt + 1,
                report: &current,
            });
        }

        feedback_history.push(feedback);

        if approved {
            debug!(
                "Specialist {} approved on attempt {}",
                specialist_id, attempt
            );
            break;
        }
    }

    ReviewedReport {
        report: current,
        feedback_history,
    }
}

/// Ask the supervisor for a verdict on the current report.
///
/// Any provider or parse failure defaults to an implicit approval.
async fn request_verdict(
    report: &SpecialistReport,
    provider: &dyn ReasoningProvider,
) -> ReviewFeedback {
    let instructions = prompts::supervisor_instructions();
    let task_text = prompts::review_task(report);

    let raw = match provider.invoke(&instructions, &task_text, true).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(
                "Supervisor call failed for specialist {}, approving implicitly: {}",
                report.specialist_id, e
            );
            return ReviewFeedback::implicit_approval(report.specialist_id);
        }
    };

    match decode_structured::<ReviewFeedback>(&raw) {
        Ok(mut feedback) => {
            feedback.specialist_id = report.specialist_id;
            feedback
        }
        Err(e) => {
            warn!(
                "Unparseable supervisor verdict for specialist {}, approving implicitly: {}",
                report.specialist_id, e.reason
            );
            ReviewFeedback::implicit_approval(report.specialist_id)
        }
    }
}

/// Re-invoke the originating specialist with the supervisor's feedback.
///
/// On any failure the previous report is kept unchanged.
async fn rework(
    previous: SpecialistReport,
    feedback: &ReviewFeedback,
    user_response: &str,
    provider: &dyn ReasoningProvider,
    retriever: &dyn ExampleRetriever,
    examples_count: usize,
) -> SpecialistReport {
    let specialist_id = previous.specialist_id;
    let domain = domain_label(specialist_id);

    let examples = match retriever.examples(specialist_id, examples_count) {
        Ok(examples) => examples,
        Err(e) => {
            warn!(
                "Rework for specialist {}: example retrieval failed, keeping previous report: {}",
                specialist_id, e
            );
            return previous;
        }
    };

    let instructions = prompts::specialist_instructions(specialist_id, domain, &examples);
    let task_text = prompts::rework_task(user_response, &previous, feedback);

    let raw = match provider.invoke(&instructions, &task_text, true).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(
                "Rework for specialist {}: provider call failed, keeping previous report: {}",
                specialist_id, e
            );
            return previous;
        }
    };

    match decode_report(&raw, specialist_id) {
        Ok(report) => report,
        Err(e) => {
            warn!(
                "Rework for specialist {}: unparseable response, keeping previous report: {}",
                specialist_id, e.reason
            );
            previous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::pipeline::testing::{NullRetriever, SequenceProvider};

    fn sample_report(score: f64) -> SpecialistReport {
        SpecialistReport {
            specialist_id: 2,
            domain: domain_label(2).to_string(),
            analysis: "initial analysis".to_string(),
            preliminary_score: score,
            risk_factors: vec![],
            justification: "initial".to_string(),
        }
    }

    fn approval() -> Result<String, ProviderError> {
        Ok(r#"{"status": "APPROVED", "specialist_id": 2}"#.to_string())
    }

    fn rework_request(feedback: &str) -> Result<String, ProviderError> {
        Ok(format!(
            r#"{{"status": "NEEDS_REWORK", "feedback": "{}", "specialist_id": 2}}"#,
            feedback
        ))
    }

    fn improved_report(score: f64) -> Result<String, ProviderError> {
        Ok(format!(
            r#"{{"specialist_id": 2, "domain": "d", "analysis": "improved", "preliminary_score": {}, "risk_factors": [], "justification": "after feedback"}}"#,
            score
        ))
    }

    #[tokio::test]
    async fn test_immediate_approval_makes_no_rework_call() {
        let provider = SequenceProvider::new(vec![approval()]);

        let reviewed = review_report(
            sample_report(40.0),
            "he shouts",
            &provider,
            &NullRetriever,
            5,
            1,
            |_| {},
        )
        .await;

        assert!(reviewed.approved());
        assert_eq!(reviewed.feedback_history.len(), 1);
        assert_eq!(reviewed.report.analysis, "initial analysis");
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_rework_then_approval() {
        let provider = SequenceProvider::new(vec![
            rework_request("needs more depth"),
            improved_report(55.0),
            approval(),
        ]);

        let reviewed = review_report(
            sample_report(40.0),
            "he shouts",
            &provider,
            &NullRetriever,
            5,
            1,
            |_| {},
        )
        .await;

        assert!(reviewed.approved());
        assert_eq!(reviewed.feedback_history.len(), 2);
        assert_eq!(reviewed.report.analysis, "improved");
        assert_eq!(reviewed.report.preliminary_score, 55.0);
    }

    #[tokio::test]
    async fn test_rework_bound_exactly_two_attempts() {
        // Never approved: with max_rework = 1 the loop makes exactly two
        // review attempts and exits Done with the reworked report.
        let provider = SequenceProvider::new(vec![
            rework_request("first pass too shallow"),
            improved_report(60.0),
            rework_request("still too shallow"),
        ]);

        let reviewed = review_report(
            sample_report(40.0),
            "he shouts",
            &provider,
            &NullRetriever,
            5,
            1,
            |_| {},
        )
        .await;

        assert!(!reviewed.approved());
        assert_eq!(reviewed.feedback_history.len(), 2);
        assert_eq!(reviewed.report.preliminary_score, 60.0);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_verdict_fails_open() {
        let provider =
            SequenceProvider::new(vec![Ok("the report looks fine to me".to_string())]);

        let reviewed = review_report(
            sample_report(40.0),
            "he shouts",
            &provider,
            &NullRetriever,
            5,
            1,
            |_| {},
        )
        .await;

        // Implicit approval, no rework attempt consumed.
        assert!(reviewed.approved());
        assert_eq!(reviewed.feedback_history.len(), 1);
        assert!(reviewed.feedback_history[0].feedback.is_none());
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_supervisor_provider_failure_fails_open() {
        let provider = SequenceProvider::new(vec![Err(ProviderError::Timeout { seconds: 30 })]);

        let reviewed = review_report(
            sample_report(40.0),
            "he shouts",
            &provider,
            &NullRetriever,
            5,
            1,
            |_| {},
        )
        .await;

        assert!(reviewed.approved());
        assert_eq!(reviewed.report.analysis, "initial analysis");
    }

    #[tokio::test]
    async fn test_failed_rework_keeps_previous_report() {
        let provider = SequenceProvider::new(vec![
            rework_request("be specific"),
            Ok("not valid json".to_string()),
            approval(),
        ]);

        let reviewed = review_report(
            sample_report(40.0),
            "he shouts",
            &provider,
            &NullRetriever,
            5,
            1,
            |_| {},
        )
        .await;

        // The rework failed to parse; the original report survived.
        assert_eq!(reviewed.report.analysis, "initial analysis");
        assert_eq!(reviewed.report.preliminary_score, 40.0);
        assert_eq!(reviewed.feedback_history.len(), 2);
    }

    #[tokio::test]
    async fn test_observe_sees_feedback_and_rework_in_order() {
        let provider = SequenceProvider::new(vec![
            rework_request("go deeper"),
            improved_report(70.0),
            approval(),
        ]);

        let mut seen = Vec::new();
        review_report(
            sample_report(40.0),
            "he shouts",
            &provider,
            &NullRetriever,
            5,
            1,
            |event| match event {
                ReviewEvent::Feedback { attempt, feedback } => {
                    seen.push(format!("feedback:{}:{:?}", attempt, feedback.status))
                }
                ReviewEvent::Rework { attempt, report } => {
                    seen.push(format!("rework:{}:{}", attempt, report.preliminary_score))
                }
            },
        )
        .await;

        assert_eq!(
            seen,
            vec![
                "feedback:0:NeedsRework".to_string(),
                "rework:1:70".to_string(),
                "feedback:1:Approved".to_string(),
            ]
        );
    }
}
