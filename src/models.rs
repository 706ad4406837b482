//! Data models for the risk-screening pipeline.
//!
//! This module contains all the core data structures used throughout
//! the application: the analysis task, specialist reports, review
//! feedback, and the final consolidated analysis.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of specialist agents (and questionnaire responses).
pub const SPECIALIST_COUNT: usize = 5;

/// Severity of an individual risk factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Low severity - isolated or ambiguous signal
    Low,
    /// Medium severity - clear warning sign, needs monitoring
    Medium,
    /// High severity - serious signal, significant risk
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🔴",
        }
    }
}

/// Overall risk classification of the final analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

impl RiskLevel {
    /// Maps a 0-100 score onto a risk band.
    ///
    /// Band edges 30 and 65 belong to the higher band: scores below 30
    /// are Low, scores in [30, 65) are Medium, 65 and above are High.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            RiskLevel::Low
        } else if score < 65.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// A single risk factor identified by a specialist.
///
/// Pure value type - two factors with the same content are the same factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Short name of the factor.
    pub factor: String,
    /// Severity of this factor.
    pub severity: Severity,
    /// Detailed description of the factor.
    pub description: String,
}

/// Report produced by one specialist for one questionnaire response.
///
/// Reports are immutable: a rework produces a new report that replaces
/// the prior one in the pipeline's working set, it never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistReport {
    /// Specialist identifier (1-5).
    pub specialist_id: u8,
    /// Domain of expertise label.
    pub domain: String,
    /// Free-text analysis of the response.
    pub analysis: String,
    /// Preliminary risk score, 0-100.
    pub preliminary_score: f64,
    /// Risk factors identified in this response.
    #[serde(default)]
    pub risk_factors: Vec<RiskFactor>,
    /// Justification for the preliminary score.
    pub justification: String,
}

impl SpecialistReport {
    /// Placeholder report used when a specialist call fails outright.
    ///
    /// The neutral score of 50.0 keeps the downstream mean meaningful
    /// while the justification records the raw failure for audit.
    pub fn placeholder(specialist_id: u8, domain: &str, failure: &str) -> Self {
        Self {
            specialist_id,
            domain: domain.to_string(),
            analysis: format!("Specialist analysis unavailable: {}", failure),
            preliminary_score: 50.0,
            risk_factors: Vec::new(),
            justification: format!("Raw failure: {}", failure),
        }
    }
}

/// Outcome of one supervisor review attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    /// Report meets the quality bar and is used as-is.
    Approved,
    /// Report should be reworked by the originating specialist.
    #[serde(rename = "NEEDS_REWORK", alias = "REWORK", alias = "REVISE")]
    NeedsRework,
}

/// Feedback from one supervisor review attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFeedback {
    /// Review verdict.
    pub status: ReviewStatus,
    /// Detailed feedback, present when rework is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Specialist being reviewed (1-5).
    pub specialist_id: u8,
}

impl ReviewFeedback {
    /// Implicit approval used when the reviewer's output cannot be parsed.
    ///
    /// The review stage fails open: an unreadable verdict never blocks
    /// the pipeline.
    pub fn implicit_approval(specialist_id: u8) -> Self {
        Self {
            status: ReviewStatus::Approved,
            feedback: None,
            specialist_id,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ReviewStatus::Approved
    }
}

/// One specialist's final report together with its full review history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewedReport {
    pub report: SpecialistReport,
    pub feedback_history: Vec<ReviewFeedback>,
}

impl ReviewedReport {
    /// Whether the last review attempt approved the report.
    pub fn approved(&self) -> bool {
        self.feedback_history
            .last()
            .map(|f| f.is_approved())
            .unwrap_or(false)
    }
}

/// The final consolidated analysis - the pipeline's terminal output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnalysis {
    /// Final consolidated risk score, 0-100.
    pub final_score: f64,
    /// Overall risk classification.
    pub risk_level: RiskLevel,
    /// All risk factors carried into the final analysis.
    pub consolidated_factors: Vec<RiskFactor>,
    /// Holistic narrative integrating all domains.
    pub synthesis: String,
    /// Recommended actions.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// The specialist reports the synthesis was built from.
    #[serde(default)]
    pub specialist_reports: Vec<SpecialistReport>,
}

/// Metadata attached to a rendered report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Request identifier assigned by the pipeline.
    pub request_id: String,
    /// When the analysis ran.
    pub analysis_date: chrono::DateTime<chrono::Utc>,
    /// Model that produced the analysis.
    pub model_used: String,
    /// Provider backend name.
    pub provider: String,
    /// Wall-clock duration of the full pipeline run.
    pub duration_seconds: f64,
}

/// A complete report: metadata plus the consolidated analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub analysis: FinalAnalysis,
}

/// Immutable pipeline input: exactly five non-empty questionnaire
/// responses, mapped 1:1 to the five specialist domains by index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    responses: [String; SPECIALIST_COUNT],
}

impl AnalysisTask {
    /// Validates and builds a task from raw responses.
    pub fn new(responses: Vec<String>) -> Result<Self, ValidationError> {
        if responses.len() != SPECIALIST_COUNT {
            return Err(ValidationError::WrongResponseCount {
                got: responses.len(),
            });
        }
        if let Some(idx) = responses.iter().position(|r| r.trim().is_empty()) {
            return Err(ValidationError::EmptyResponse { index: idx + 1 });
        }

        let responses: [String; SPECIALIST_COUNT] =
            responses.try_into().expect("length checked above");

        Ok(Self { responses })
    }

    /// Response for a given specialist id (1-5).
    pub fn response_for(&self, specialist_id: u8) -> &str {
        &self.responses[(specialist_id - 1) as usize]
    }

    pub fn responses(&self) -> &[String; SPECIALIST_COUNT] {
        &self.responses
    }
}

/// Fixed domain rubrics, one per specialist id.
const DOMAIN_LABELS: [&str; SPECIALIST_COUNT] = [
    "Daily Routine, Overload and Division of Household Tasks",
    "Emotional Tone, Communication and Intimidation",
    "Support Network, Social Isolation and Bonds",
    "Financial Control and Economic Dependence",
    "Physical and Psychological Wellbeing",
];

/// Domain label for a specialist id (1-5).
pub fn domain_label(specialist_id: u8) -> &'static str {
    DOMAIN_LABELS
        .get((specialist_id as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("Unknown Domain")
}

/// Iterator over all specialist ids, in order.
pub fn specialist_ids() -> impl Iterator<Item = u8> {
    1..=SPECIALIST_COUNT as u8
}
