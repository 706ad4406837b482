//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.riskpanel.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Reasoning provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Casebook (few-shot data) settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Audit trail settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "risk_report.md".to_string()
}

/// Which provider adapter to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama instance (default).
    #[default]
    Ollama,
    /// OpenAI chat completions API.
    Openai,
    /// Groq's OpenAI-compatible API.
    Groq,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Openai => write!(f, "openai"),
            ProviderKind::Groq => write!(f, "groq"),
        }
    }
}

/// Reasoning provider settings.
///
/// Immutable after process startup; the pipeline never branches on
/// provider identity, it only calls the selected adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider adapter to use.
    #[serde(default)]
    pub kind: ProviderKind,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL. For Ollama this is the instance URL; for OpenAI and
    /// Groq it is the OpenAI-compatible base (empty means the provider's
    /// well-known default).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ollama,
            model: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_api_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> usize {
    4000
}

fn default_timeout() -> u64 {
    120
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum rework attempts per specialist.
    #[serde(default = "default_max_rework")]
    pub max_rework: usize,

    /// Few-shot examples injected into each specialist prompt.
    #[serde(default = "default_examples_per_specialist")]
    pub examples_per_specialist: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_rework: default_max_rework(),
            examples_per_specialist: default_examples_per_specialist(),
        }
    }
}

fn default_max_rework() -> usize {
    1
}

fn default_examples_per_specialist() -> usize {
    5
}

/// Casebook data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding `specialist_{1..5}.json` casebook files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

/// Audit trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory where per-request audit files are written.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Disable audit persistence entirely.
    #[serde(default)]
    pub disabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            disabled: false,
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".riskpanel.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Model settings - always override since they have defaults in CLI
        self.provider.model = args.model.clone();
        self.provider.temperature = args.temperature;

        if let Some(kind) = args.provider {
            self.provider.kind = kind;
        }
        if let Some(ref api_url) = args.api_url {
            self.provider.api_url = api_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.provider.timeout_seconds = timeout;
        }

        // Pipeline settings - only override if explicitly provided
        if let Some(max_rework) = args.max_rework {
            self.pipeline.max_rework = max_rework;
        }
        if let Some(examples) = args.examples {
            self.pipeline.examples_per_specialist = examples;
        }

        // Data and audit directories
        if let Some(ref data_dir) = args.data_dir {
            self.data.data_dir = data_dir.display().to_string();
        }
        if let Some(ref log_dir) = args.log_dir {
            self.audit.log_dir = log_dir.display().to_string();
        }
        if args.no_audit {
            self.audit.disabled = true;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
