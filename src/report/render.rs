//! Output renderers for audit results
//!
//! Supports two formats:
//! - `text` - Terminal output with ANSI colors
//! - `json` - Machine-readable JSON

use crate::pipeline::AuditOutcome;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render an audit outcome in the specified format
pub fn render(outcome: &AuditOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => render_text(outcome),
        OutputFormat::Json => render_json(outcome),
    }
}

/// Render as pretty-printed JSON
pub fn render_json(outcome: &AuditOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Severity colors keyed on the row's upper-cased severity
fn severity_color(severity: &str) -> &'static str {
    match severity {
        "CRITICAL" => "\x1b[31m", // Red
        "HIGH" => "\x1b[91m",     // Light red
        "MEDIUM" => "\x1b[33m",   // Yellow
        "LOW" => "\x1b[34m",      // Blue
        _ => "\x1b[90m",          // Gray
    }
}

/// Render as formatted terminal output
pub fn render_text(outcome: &AuditOutcome) -> Result<String> {
    let mut out = String::new();
    let report = &outcome.report;

    out.push_str(&format!("\n{BOLD}Depwarden Audit{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));

    let s = &report.summary;
    let mut summary_parts = Vec::new();
    if s.critical > 0 {
        summary_parts.push(format!("\x1b[31m{} critical{RESET}", s.critical));
    }
    if s.high > 0 {
        summary_parts.push(format!("\x1b[91m{} high{RESET}", s.high));
    }
    if s.medium > 0 {
        summary_parts.push(format!("\x1b[33m{} medium{RESET}", s.medium));
    }
    if s.low > 0 {
        summary_parts.push(format!("\x1b[34m{} low{RESET}", s.low));
    }
    if s.unknown > 0 {
        summary_parts.push(format!("\x1b[90m{} unknown{RESET}", s.unknown));
    }
    out.push_str(&format!(
        "Findings: {BOLD}{}{RESET} reportable of {} total",
        s.total, outcome.total_findings
    ));
    if !summary_parts.is_empty() {
        out.push_str(&format!("  ({})", summary_parts.join(" | ")));
    }
    out.push_str("\n\n");

    if !report.rows.is_empty() {
        out.push_str(&format!(
            "{DIM}  SEVERITY  PACKAGE                     CVE                 TITLE{RESET}\n"
        ));
        out.push_str(&format!(
            "{DIM}  ─────────────────────────────────────────────────────────────────────────{RESET}\n"
        ));

        for row in &report.rows {
            let color = severity_color(&row.severity);
            out.push_str(&format!(
                "  {color}{:<8}{RESET}  {:<26}  {:<18}  {}\n",
                row.severity, row.package, row.cve, row.title
            ));
            out.push_str(&format!(
                "  {DIM}          affected: {}  fix info: {}{RESET}\n",
                row.affected_versions, row.link
            ));
            if row.explanation != "N/A" {
                out.push_str(&format!("  {DIM}          {}{RESET}\n", row.explanation));
            }
            if row.custom_info != "N/A" {
                out.push_str(&format!("  {DIM}          {}{RESET}\n", row.custom_info));
            }
        }
        out.push('\n');
    }

    let headline_color = if s.critical > 0 {
        "\x1b[31m"
    } else if s.high > 0 {
        "\x1b[91m"
    } else if s.total > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };
    out.push_str(&format!("{headline_color}{BOLD}{}{RESET}\n", report.headline));

    if !outcome.warnings.is_empty() {
        out.push_str(&format!("\n{BOLD}WARNINGS{RESET}\n"));
        for warning in &outcome.warnings {
            out.push_str(&format!("  {DIM}- {}{RESET}\n", warning));
        }
    }

    Ok(out)
}
