//! RiskPanel - LLM-powered multi-agent risk screening
//!
//! A CLI tool that runs five specialist agents over five questionnaire
//! responses, has a supervisor review each report (with bounded rework),
//! and consolidates everything into one final risk analysis.
//!
//! Exit codes:
//!   0 - Success (risk below threshold, or no --fail-on set)
//!   1 - Runtime error (connection, config, input failure, etc.)
//!   2 - Final risk level at or above the --fail-on threshold

mod audit;
mod casebook;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod prompts;
mod provider;
mod report;

use anyhow::{Context, Result};
use audit::{AuditSink, FileAuditSink, NullAuditSink};
use casebook::Casebook;
use chrono::Utc;
use cli::{Args, FailOnLevel, OutputFormat};
use config::Config;
use models::{specialist_ids, domain_label, AnalysisTask, Report, ReportMetadata, RiskLevel};
use pipeline::{Pipeline, PipelineOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("RiskPanel v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the screening
    match run_screening(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Screening failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .riskpanel.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".riskpanel.toml");

    if path.exists() {
        eprintln!("⚠️  .riskpanel.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .riskpanel.toml")?;

    println!("✅ Created .riskpanel.toml with default settings.");
    println!("   Edit it to customize provider, model, casebook directory, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete screening workflow. Returns exit code (0 or 2).
async fn run_screening(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Load the casebook
    let data_dir = PathBuf::from(&config.data.data_dir);
    let casebook = Casebook::load(&data_dir)
        .with_context(|| format!("Failed to load casebook from {}", data_dir.display()))?;

    // Handle --dry-run: show what would run, no LLM calls
    if args.dry_run {
        return handle_dry_run(&config, &casebook);
    }

    // Step 2: Read and validate the input responses
    let input = args
        .input
        .as_ref()
        .context("An --input file is required")?;
    let responses = read_responses(input)?;
    let task = AnalysisTask::new(responses)?;

    // Step 3: Build the pipeline
    println!("🤖 Initializing analysis pipeline...");
    println!("   Provider: {}", config.provider.kind);
    println!("   Model: {}", config.provider.model);
    println!("   Max rework: {}", config.pipeline.max_rework);
    println!("   Timeout: {}s", config.provider.timeout_seconds);

    let provider = provider::build_provider(&config.provider, args.api_key.as_deref())?;

    let audit_sink: Arc<dyn AuditSink> = if config.audit.disabled {
        Arc::new(NullAuditSink)
    } else {
        Arc::new(FileAuditSink::new(PathBuf::from(&config.audit.log_dir))?)
    };

    let pipeline = Pipeline::new(
        provider,
        Arc::new(casebook),
        audit_sink,
        PipelineOptions {
            max_rework: config.pipeline.max_rework,
            examples_per_specialist: config.pipeline.examples_per_specialist,
        },
    );

    // Step 4: Run the analysis
    println!("\n🔬 Running multi-agent analysis...");
    println!("   Five specialists analyze in parallel, then each report is reviewed.\n");

    let request_id = Uuid::new_v4().to_string();
    let analysis = pipeline.run_with_id(request_id.clone(), task).await?;

    // Step 5: Build and save the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let final_report = Report {
        metadata: ReportMetadata {
            request_id,
            analysis_date: Utc::now(),
            model_used: config.provider.model.clone(),
            provider: config.provider.kind.to_string(),
            duration_seconds: duration,
        },
        analysis,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&final_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&final_report),
    };

    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    // Print summary
    let analysis = &final_report.analysis;
    println!("\n📊 Screening Summary:");
    println!(
        "   Final score: {:.1} / 100 ({} risk)",
        analysis.final_score, analysis.risk_level
    );
    println!("   Risk factors: {}", analysis.consolidated_factors.len());
    println!("   Recommendations: {}", analysis.recommendations.len());
    for report in &analysis.specialist_reports {
        println!(
            "   - Specialist {} ({}): {:.1}",
            report.specialist_id, report.domain, report.preliminary_score
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Screening complete! Report saved to: {}",
        args.output.display()
    );

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        let threshold = fail_on_to_risk_level(fail_level);

        if analysis.risk_level >= threshold {
            eprintln!(
                "\n⛔ Final risk level {} is at or above {:?}. Failing (exit code 2).",
                analysis.risk_level, fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Handle --dry-run: show configuration and casebook coverage, exit.
fn handle_dry_run(config: &Config, casebook: &Casebook) -> Result<i32> {
    println!("\n🔍 Dry run: no LLM calls will be made.\n");

    println!("   Provider: {} ({})", config.provider.kind, config.provider.model);
    println!("   Max rework: {}", config.pipeline.max_rework);
    println!(
        "   Examples per specialist: {}",
        config.pipeline.examples_per_specialist
    );
    println!();

    for id in specialist_ids() {
        println!(
            "   👤 Specialist {}: {} ({} reference cases)",
            id,
            domain_label(id),
            casebook.case_count(id)
        );
    }

    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Input file shape: either a bare array of five strings or an object
/// with a "responses" field.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum InputFile {
    Bare(Vec<String>),
    Wrapped { responses: Vec<String> },
}

/// Read the questionnaire responses from the input file.
fn read_responses(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let input: InputFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))?;

    Ok(match input {
        InputFile::Bare(responses) => responses,
        InputFile::Wrapped { responses } => responses,
    })
}

/// Convert FailOnLevel to RiskLevel for comparison.
fn fail_on_to_risk_level(level: FailOnLevel) -> RiskLevel {
    match level {
        FailOnLevel::Low => RiskLevel::Low,
        FailOnLevel::Medium => RiskLevel::Medium,
        FailOnLevel::High => RiskLevel::High,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .riskpanel.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
