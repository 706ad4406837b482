//! Markdown report generation.
//!
//! This module renders the final consolidated analysis as a
//! human-readable Markdown document or as pretty-printed JSON.

use crate::models::{FinalAnalysis, Report, ReportMetadata, RiskFactor, RiskLevel, SpecialistReport};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Risk Screening Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    // Overall assessment
    output.push_str(&generate_assessment_section(&report.analysis));

    // Synthesis narrative
    output.push_str(&generate_synthesis_section(&report.analysis.synthesis));

    // Consolidated risk factors
    output.push_str(&generate_factors_section(&report.analysis.consolidated_factors));

    // Per-specialist breakdown
    output.push_str(&generate_specialists_section(&report.analysis.specialist_reports));

    // Recommendations
    output.push_str(&generate_recommendations_section(&report.analysis.recommendations));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Request ID:** `{}`\n", metadata.request_id));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!("- **Provider:** {}\n", metadata.provider));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push_str("\n");

    section
}

/// Badge for an overall risk level.
fn risk_level_badge(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "🟢 **LOW**",
        RiskLevel::Medium => "🟡 **MEDIUM**",
        RiskLevel::High => "🔴 **HIGH**",
    }
}

/// Generate the overall assessment section.
fn generate_assessment_section(analysis: &FinalAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Overall Assessment\n\n");
    section.push_str(&format!(
        "| Final Score | Risk Level |\n|:---:|:---:|\n| **{:.1}** / 100 | {} |\n\n",
        analysis.final_score,
        risk_level_badge(analysis.risk_level)
    ));

    section
}

/// Generate the synthesis narrative section.
fn generate_synthesis_section(synthesis: &str) -> String {
    if synthesis.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Synthesis\n\n");
    section.push_str(synthesis);
    section.push_str("\n\n");

    section
}

/// Generate the consolidated risk factors section.
fn generate_factors_section(factors: &[RiskFactor]) -> String {
    let mut section = String::new();

    section.push_str("## Consolidated Risk Factors\n\n");

    if factors.is_empty() {
        section.push_str("No risk factors were identified.\n\n");
        return section;
    }

    // Highest severity first, original order within a severity.
    let mut sorted: Vec<&RiskFactor> = factors.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));

    section.push_str("| Severity | Factor | Description |\n");
    section.push_str("|:---:|:---|:---|\n");
    for factor in sorted {
        section.push_str(&format!(
            "| {} {} | {} | {} |\n",
            factor.severity.emoji(),
            factor.severity,
            factor.factor,
            factor.description.replace('\n', " ")
        ));
    }
    section.push_str("\n");

    section
}

/// Generate the per-specialist breakdown section.
fn generate_specialists_section(reports: &[SpecialistReport]) -> String {
    if reports.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Specialist Reports\n\n");

    for report in reports {
        section.push_str(&generate_specialist_block(report));
    }

    section
}

/// Generate the block for a single specialist report.
fn generate_specialist_block(report: &SpecialistReport) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### Specialist {} - {}\n\n",
        report.specialist_id, report.domain
    ));
    block.push_str(&format!(
        "**Preliminary Score:** {:.1} / 100\n\n",
        report.preliminary_score
    ));

    if !report.analysis.is_empty() {
        block.push_str(&format!("{}\n\n", report.analysis));
    }

    for factor in &report.risk_factors {
        block.push_str(&format!(
            "- {} **{}** ({}): {}\n",
            factor.severity.emoji(),
            factor.factor,
            factor.severity,
            factor.description
        ));
    }
    if !report.risk_factors.is_empty() {
        block.push_str("\n");
    }

    if !report.justification.is_empty() {
        block.push_str(&format!("> **Justification:** {}\n\n", report.justification));
    }

    block.push_str("---\n\n");

    block
}

/// Generate the recommendations section.
fn generate_recommendations_section(recommendations: &[String]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recommendations\n\n");

    for (i, rec) in recommendations.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, rec));
    }
    section.push_str("\n");

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by riskpanel*\n");

    footer
}

/// Write the report to a file.
#[allow(dead_code)] // Alternative to writing in main
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    let content = generate_markdown_report(report);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
