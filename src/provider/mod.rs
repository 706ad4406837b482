//! Reasoning provider adapters.
//!
//! The pipeline talks to a single abstract capability: "given instructions
//! and a task, produce text", with an optional JSON-structured-output mode.
//! One adapter is selected at startup from immutable configuration; the
//! orchestration code never branches on provider identity.

pub mod ollama;
pub mod openai;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The narrow interface every reasoning provider implements.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Runs one agent call: fixed instructions plus a per-call task.
    ///
    /// With `structured` set, the provider is asked to constrain its
    /// output to JSON. Failures surface as `ProviderError` and are
    /// absorbed per-item by the calling stage, never propagated past it.
    async fn invoke(
        &self,
        instructions: &str,
        task: &str,
        structured: bool,
    ) -> Result<String, ProviderError>;
}

/// Well-known OpenAI-compatible base URL for Groq.
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";

/// Well-known base URL for OpenAI.
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Construct the configured provider adapter.
///
/// Called once at startup; the returned provider is shared read-only by
/// every concurrent request.
pub fn build_provider(
    config: &ProviderConfig,
    api_key: Option<&str>,
) -> Result<Arc<dyn ReasoningProvider>> {
    match config.kind {
        ProviderKind::Ollama => Ok(Arc::new(ollama::OllamaProvider::new(config)?)),
        ProviderKind::Openai => {
            let key = require_key(api_key, "OpenAI")?;
            let base_url = resolve_base_url(config, OPENAI_API_URL);
            Ok(Arc::new(openai::OpenAiProvider::new(config, base_url, key)?))
        }
        ProviderKind::Groq => {
            let key = require_key(api_key, "Groq")?;
            let base_url = resolve_base_url(config, GROQ_API_URL);
            Ok(Arc::new(openai::OpenAiProvider::new(config, base_url, key)?))
        }
    }
}

fn require_key(api_key: Option<&str>, provider: &str) -> Result<String> {
    api_key
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("{} requires an API key (--api-key or RISKPANEL_API_KEY)", provider))
}

/// Cloud providers keep the default Ollama URL only when the operator did
/// not override it, so a stale local URL never reaches a cloud adapter.
fn resolve_base_url(config: &ProviderConfig, well_known: &str) -> String {
    if config.api_url.is_empty() || config.api_url == crate::config::ProviderConfig::default().api_url
    {
        well_known.to_string()
    } else {
        config.api_url.clone()
    }
}
