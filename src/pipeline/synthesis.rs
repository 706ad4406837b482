//! Synthesis stage.
//!
//! Consolidates the five final specialist reports into one
//! `FinalAnalysis` with a single structured provider call. The stage
//! never fails outward: when the call or its parsing fails, a
//! deterministic fallback is computed from the preliminary scores. The
//! fallback is the system's designed degraded mode, not an error path.

use crate::error::ParseError;
use crate::models::{FinalAnalysis, RiskLevel, SpecialistReport};
use crate::pipeline::structured::decode_structured;
use crate::prompts;
use crate::provider::ReasoningProvider;
use tracing::{debug, warn};

/// Default recommendations used by the fallback synthesis.
const FALLBACK_RECOMMENDATIONS: [&str; 4] = [
    "Reach out to a trusted support network (family, friends)",
    "Consider professional guidance (counselor, social worker)",
    "Keep a record of concerning situations",
    "Learn which protective resources and support services are available locally",
];

/// Consolidate the final reports into one analysis.
pub async fn synthesize(
    reports: Vec<SpecialistReport>,
    provider: &dyn ReasoningProvider,
) -> FinalAnalysis {
    let instructions = prompts::synthesizer_instructions();
    let task_text = prompts::synthesis_task(&reports);

    let raw = match provider.invoke(&instructions, &task_text, true).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Synthesis call failed, computing fallback: {}", e);
            return fallback_synthesis(reports);
        }
    };

    match decode_synthesis(&raw) {
        Ok(mut analysis) => {
            debug!(
                "Synthesis complete: score {:.1}, level {}",
                analysis.final_score, analysis.risk_level
            );
            analysis.specialist_reports = reports;
            analysis
        }
        Err(e) => {
            warn!("Unparseable synthesis response, computing fallback: {}", e.reason);
            fallback_synthesis(reports)
        }
    }
}

/// Decode and sanity-check the synthesizer's structured response.
fn decode_synthesis(response: &str) -> Result<FinalAnalysis, ParseError> {
    let analysis: FinalAnalysis = decode_structured(response)?;

    if !(0.0..=100.0).contains(&analysis.final_score) {
        return Err(ParseError {
            reason: format!("final_score {} outside 0-100", analysis.final_score),
            raw: response.to_string(),
        });
    }

    Ok(analysis)
}

/// Deterministic degraded-mode synthesis.
///
/// Final score is the arithmetic mean of the preliminary scores; the
/// risk level follows the standard bands; factors are concatenated
/// without deduplication.
pub fn fallback_synthesis(reports: Vec<SpecialistReport>) -> FinalAnalysis {
    let count = reports.len().max(1);
    let mean: f64 = reports.iter().map(|r| r.preliminary_score).sum::<f64>() / count as f64;

    let consolidated_factors = reports
        .iter()
        .flat_map(|r| r.risk_factors.iter().cloned())
        .collect();

    FinalAnalysis {
        final_score: mean,
        risk_level: RiskLevel::from_score(mean),
        consolidated_factors,
        synthesis: format!(
            "Consolidated analysis based on {} specialist reports. Mean score: {:.1}",
            reports.len(),
            mean
        ),
        recommendations: FALLBACK_RECOMMENDATIONS
            .iter()
            .map(|r| r.to_string())
            .collect(),
        specialist_reports: reports,
    }
}
