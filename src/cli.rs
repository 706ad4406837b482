//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::ProviderKind;
use clap::Parser;
use std::path::PathBuf;

/// RiskPanel - LLM-powered multi-agent risk screening
///
/// Runs five specialist agents over five questionnaire responses, has a
/// supervisor agent review each report (with bounded rework), and
/// consolidates everything into one final risk analysis.
///
/// Examples:
///   riskpanel --input responses.json
///   riskpanel --input responses.json --provider groq --model llama3-8b-8192
///   riskpanel --input responses.json --format json --output analysis.json
///   riskpanel --dry-run
///   riskpanel --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to a JSON file with the five responses to analyze
    ///
    /// Accepts either a bare array of 5 strings or an object of the form
    /// {"responses": ["...", ...]}. Not required with --init-config or
    /// --dry-run.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Model to use for all agents
    ///
    /// For Ollama use a local model tag (e.g. llama3.2:latest); for
    /// OpenAI/Groq the API model name (e.g. gpt-4o-mini, llama3-8b-8192).
    #[arg(short, long, default_value = "llama3.2:latest", env = "RISKPANEL_MODEL")]
    pub model: String,

    /// Reasoning provider to use (ollama, openai, groq)
    ///
    /// Selected once at startup. If not given, comes from config
    /// (default: ollama).
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<ProviderKind>,

    /// Provider API base URL
    ///
    /// Defaults to http://localhost:11434 for Ollama and each cloud
    /// provider's well-known base otherwise.
    #[arg(long, value_name = "URL", env = "RISKPANEL_API_URL")]
    pub api_url: Option<String>,

    /// API key for cloud providers (OpenAI, Groq)
    #[arg(long, value_name = "KEY", env = "RISKPANEL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output file path for the report
    #[arg(short, long, default_value = "risk_report.md", value_name = "FILE")]
    pub output: PathBuf,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .riskpanel.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Temperature for LLM responses (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.2")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum rework attempts per specialist
    ///
    /// Each specialist report gets at most this many supervisor-requested
    /// rework passes before being used as-is. Default: from config or 1.
    #[arg(long, value_name = "COUNT")]
    pub max_rework: Option<usize>,

    /// Few-shot reference cases injected into each specialist prompt
    #[arg(long, value_name = "COUNT")]
    pub examples: Option<usize>,

    /// Directory holding the per-specialist casebook files
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory where per-request audit trails are written
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Disable audit trail persistence
    #[arg(long)]
    pub no_audit: bool,

    /// Fail if the final risk level is at or above this level
    ///
    /// Useful for scripted screening. Exit code 2 when the threshold is met.
    /// Values: low, medium, high
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load config and casebook, print what would run, no LLM calls
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .riskpanel.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Risk level threshold for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.input.is_none() && !self.dry_run {
            return Err("An --input file is required (or use --dry-run)".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref data_dir) = self.data_dir {
            if !data_dir.is_dir() {
                return Err(format!(
                    "Casebook directory does not exist: {}",
                    data_dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            model: "test".to_string(),
            provider: None,
            api_url: None,
            api_key: None,
            output: PathBuf::from("test.md"),
            format: OutputFormat::Markdown,
            config: None,
            temperature: 0.2,
            timeout: None,
            max_rework: None,
            examples: None,
            data_dir: None,
            log_dir: None,
            no_audit: false,
            fail_on: None,
            verbose: false,
            quiet: false,
            dry_run: true,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_requires_input() {
        let mut args = make_args();
        args.dry_run = false;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_api_url() {
        let mut args = make_args();
        args.api_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_temperature_range() {
        let mut args = make_args();
        args.temperature = 1.5;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
