//! Few-shot casebook loading.
//!
//! Each specialist has a casebook of previously labeled cases, loaded
//! once at startup from `data/specialist_{1..5}.json`. Per analysis call
//! the pipeline samples a handful of cases and injects them into the
//! specialist's instructions as reference material.

use crate::error::RetrieverError;
use crate::models::{specialist_ids, SPECIALIST_COUNT};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// One labeled reference case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseExample {
    /// The respondent statement.
    pub statement: String,
    /// Labeled risk level for the statement.
    pub risk: String,
    /// The dominant factor behind the label.
    pub factor: String,
    /// Optional annotator note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Supplies reference cases per specialist.
///
/// The pipeline treats retrieval as synchronous and side-effect-free.
pub trait ExampleRetriever: Send + Sync {
    /// Formatted reference block for a specialist id (1-5).
    fn examples(&self, specialist_id: u8, count: usize) -> Result<String, RetrieverError>;
}

/// File-backed casebook holding all five specialists' cases in memory.
#[derive(Debug)]
pub struct Casebook {
    cases: HashMap<u8, Vec<CaseExample>>,
}

impl Casebook {
    /// Load all five casebook files from a directory.
    ///
    /// Every file must exist and parse; a screening run with a missing
    /// rubric's casebook is not meaningful.
    pub fn load(data_dir: &Path) -> Result<Self, RetrieverError> {
        let mut cases = HashMap::with_capacity(SPECIALIST_COUNT);

        for id in specialist_ids() {
            let path = data_dir.join(format!("specialist_{}.json", id));
            let content = std::fs::read_to_string(&path).map_err(|e| {
                RetrieverError::Load(format!("{}: {}", path.display(), e))
            })?;
            let parsed: Vec<CaseExample> = serde_json::from_str(&content).map_err(|e| {
                RetrieverError::Load(format!("{}: {}", path.display(), e))
            })?;
            cases.insert(id, parsed);
        }

        info!(
            "Loaded casebooks for {} specialists from {}",
            cases.len(),
            data_dir.display()
        );

        Ok(Self { cases })
    }

    /// Build a casebook directly from in-memory cases.
    #[allow(dead_code)] // Utility for embedding custom casebooks
    pub fn from_cases(cases: HashMap<u8, Vec<CaseExample>>) -> Self {
        Self { cases }
    }

    /// Number of cases held for a specialist.
    pub fn case_count(&self, specialist_id: u8) -> usize {
        self.cases.get(&specialist_id).map_or(0, Vec::len)
    }
}

/// Format sampled cases into the reference block injected into prompts.
fn format_examples(cases: &[&CaseExample]) -> String {
    let mut formatted = String::from("=== REFERENCE CASES ===\n\n");

    for (idx, case) in cases.iter().enumerate() {
        formatted.push_str(&format!("CASE {}:\n", idx + 1));
        formatted.push_str(&format!("Statement: \"{}\"\n", case.statement));
        formatted.push_str(&format!("Risk: {}\n", case.risk));
        formatted.push_str(&format!("Factor: {}\n", case.factor));
        if let Some(ref note) = case.note {
            formatted.push_str(&format!("Note: {}\n", note));
        }
        formatted.push('\n');
        formatted.push_str(&"-".repeat(50));
        formatted.push_str("\n\n");
    }

    formatted
}

impl ExampleRetriever for Casebook {
    fn examples(&self, specialist_id: u8, count: usize) -> Result<String, RetrieverError> {
        let cases = self
            .cases
            .get(&specialist_id)
            .ok_or(RetrieverError::NotFound(specialist_id))?;

        let mut rng = rand::thread_rng();
        let sampled: Vec<&CaseExample> = if cases.len() <= count {
            cases.iter().collect()
        } else {
            cases.choose_multiple(&mut rng, count).collect()
        };

        Ok(format_examples(&sampled))
    }
}
