//! Core data models for Depwarden
//!
//! These models are used throughout the codebase for representing
//! normalized vulnerability findings and severity ordering.

use serde::{Deserialize, Serialize};

/// Severity levels for vulnerability findings.
///
/// Totally ordered: Critical > High > Medium > Low > Unknown. Every
/// component that filters, sorts, or gates on severity goes through
/// [`Severity::rank`] so the ordering lives in exactly one place.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Unknown = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    /// Integer rank used for comparison (Critical = 4 ... Unknown = 0).
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Normalize a raw provider severity string.
    ///
    /// Case-insensitive with a fixed synonym table; anything unrecognized
    /// (including the empty string) maps to `Unknown`.
    pub fn parse(raw: &str) -> Severity {
        match raw.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" | "minor" => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    /// Strict variant for configuration values: `None` when the string is
    /// not a recognized severity, so a typo disables gating instead of
    /// silently matching everything at rank 0.
    pub fn from_config(raw: &str) -> Option<Severity> {
        match raw.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" | "minor" => Some(Severity::Low),
            "unknown" => Some(Severity::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
            Severity::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which audit tool or provider produced the raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Composer,
    Npm,
    Custom,
}

impl std::fmt::Display for FindingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingSource::Composer => write!(f, "composer"),
            FindingSource::Npm => write!(f, "npm"),
            FindingSource::Custom => write!(f, "custom"),
        }
    }
}

/// A normalized vulnerability finding.
///
/// Created exactly once per raw advisory item by the per-source parsers.
/// Enrichment may only fill `explanation` and `custom_info` when they are
/// still absent; everything else is immutable after normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub source: FindingSource,
    pub package: String,
    #[serde(default)]
    pub cve: Option<String>,
    pub title: String,
    #[serde(default)]
    pub severity: Severity,
    pub affected_versions: String,
    #[serde(default)]
    pub link: Option<String>,
    /// Upgrade target when the provider knows one (e.g. `lodash@4.17.21`).
    #[serde(default)]
    pub fix_available: Option<String>,
    /// Filled by enrichment, never by normalization.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Filled by enrichment, never by normalization.
    #[serde(default)]
    pub custom_info: Option<serde_json::Map<String, serde_json::Value>>,
    /// Untouched provider payload, kept for prompt construction and
    /// debugging. Only the prompt builder reads into it.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Finding {
    /// Sentinel used wherever a required upstream field was absent.
    pub const NA: &'static str = "N/A";
}

/// Summary of findings by severity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingsSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
    pub total: usize,
}

impl FindingsSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for f in findings {
            match f.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Unknown => summary.unknown += 1,
            }
            summary.total += 1;
        }
        summary
    }
}

/// Severity thresholds for one audit run, passed explicitly into the
/// pipeline. `fail: None` means the gate never trips on severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportThresholds {
    pub report: Severity,
    pub fail: Option<Severity>,
}

impl Default for ReportThresholds {
    fn default() -> Self {
        Self {
            report: Severity::Medium,
            fail: None,
        }
    }
}
