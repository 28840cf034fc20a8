//! Audit sources
//!
//! Each source wraps one external feed (a package-manager audit tool or
//! the custom CVE API) and normalizes its raw JSON into canonical
//! [`Finding`]s. Parsers are pure functions over `serde_json::Value` so
//! they are testable without running the underlying tool.
//!
//! A source failing — tool missing, malformed output, bad configuration —
//! never aborts the run; the pipeline records the error as a warning and
//! continues with the other sources.

pub mod composer;
pub mod custom;
mod external_tool;
pub mod npm;

pub use composer::ComposerSource;
pub use custom::CustomSource;
pub use external_tool::{is_tool_installed, run_audit_tool, ToolOutput};
pub use npm::NpmSource;

use crate::models::{Finding, FindingSource};
use thiserror::Error;

/// Per-source failure taxonomy. Local to one source per run; the pipeline
/// absorbs these into warnings.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Underlying tool missing, no lockfile, or the feed did not respond.
    #[error("{src_kind} audit unavailable: {reason}")]
    Unavailable {
        src_kind: FindingSource,
        reason: String,
    },

    /// Malformed JSON or unexpected top-level shape from one source.
    #[error("{src_kind} audit output could not be parsed: {reason}")]
    Parse {
        src_kind: FindingSource,
        reason: String,
    },

    /// The source was selected but is not configured; detected before any
    /// fetch is attempted.
    #[error("{src_kind} source is not configured: {reason}")]
    Configuration {
        src_kind: FindingSource,
        reason: String,
    },
}

/// One audit feed. Implementations run the tool or HTTP fetch and return
/// findings in deterministic encounter order: lexical package-key order,
/// then advisory order within a package.
pub trait AuditSource {
    fn kind(&self) -> FindingSource;
    fn collect(&self) -> Result<Vec<Finding>, SourceError>;
}

/// Non-empty string field accessor shared by the parsers.
pub(crate) fn non_empty_str<'a>(value: Option<&'a serde_json::Value>) -> Option<&'a str> {
    value.and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}
