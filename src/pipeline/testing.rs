//! Scripted provider and retriever doubles shared by the pipeline tests.

use crate::casebook::ExampleRetriever;
use crate::error::{ProviderError, RetrieverError};
use crate::provider::ReasoningProvider;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Provider that answers every call with the same canned response,
/// optionally failing calls whose prompt contains a marker.
pub struct ScriptedProvider {
    response: String,
    fail_marker: Option<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail_marker: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail any call whose instructions or task contain `marker`.
    pub fn failing_when(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    async fn invoke(
        &self,
        instructions: &str,
        task: &str,
        _structured: bool,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((instructions.to_string(), task.to_string()));

        if let Some(ref marker) = self.fail_marker {
            if instructions.contains(marker.as_str()) || task.contains(marker.as_str()) {
                return Err(ProviderError::Connection {
                    url: "http://scripted".to_string(),
                });
            }
        }

        Ok(self.response.clone())
    }
}

/// Provider that pops responses in call order. Only meaningful for
/// strictly sequential call patterns (a single review loop).
pub struct SequenceProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
}

impl SequenceProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningProvider for SequenceProvider {
    async fn invoke(
        &self,
        _instructions: &str,
        _task: &str,
        _structured: bool,
    ) -> Result<String, ProviderError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::Decode(
                "sequence exhausted".to_string(),
            )))
    }
}

/// Provider that dispatches on the agent role baked into the
/// instructions, for whole-pipeline tests where calls interleave.
pub struct RoleProvider {
    pub specialist: String,
    pub supervisor: String,
    pub synthesizer: String,
}

#[async_trait]
impl ReasoningProvider for RoleProvider {
    async fn invoke(
        &self,
        instructions: &str,
        _task: &str,
        _structured: bool,
    ) -> Result<String, ProviderError> {
        if instructions.contains("Supervisor Agent") {
            Ok(self.supervisor.clone())
        } else if instructions.contains("Synthesizer Agent") {
            Ok(self.synthesizer.clone())
        } else {
            Ok(self.specialist.clone())
        }
    }
}

/// Retriever that supplies an empty reference block.
pub struct NullRetriever;

impl ExampleRetriever for NullRetriever {
    fn examples(&self, _specialist_id: u8, _count: usize) -> Result<String, RetrieverError> {
        Ok("=== REFERENCE CASES ===\n\n(none)".to_string())
    }
}
