//! Composer audit source
//!
//! Runs `composer audit --format=json` and normalizes its advisory map
//! into canonical findings.

use crate::models::{Finding, FindingSource, Severity};
use crate::sources::{non_empty_str, run_audit_tool, AuditSource, SourceError};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use tracing::{info, warn};

/// Composer dependency audit source
pub struct ComposerSource {
    repository_path: PathBuf,
    timeout_secs: u64,
}

impl ComposerSource {
    pub fn new(repository_path: impl Into<PathBuf>) -> Self {
        Self {
            repository_path: repository_path.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Check for composer.json and composer.lock; audit needs the lock.
    fn check_prerequisites(&self) -> Result<(), String> {
        if !self.repository_path.join("composer.json").exists() {
            return Err("no composer.json found".to_string());
        }
        if !self.repository_path.join("composer.lock").exists() {
            return Err(
                "no composer.lock found. Run 'composer install' or 'composer update' first."
                    .to_string(),
            );
        }
        Ok(())
    }
}

impl AuditSource for ComposerSource {
    fn kind(&self) -> FindingSource {
        FindingSource::Composer
    }

    fn collect(&self) -> Result<Vec<Finding>, SourceError> {
        if let Err(reason) = self.check_prerequisites() {
            return Err(SourceError::Unavailable {
                src_kind: FindingSource::Composer,
                reason,
            });
        }

        let output = run_audit_tool(
            &["composer", "audit", "--format=json", "--locked"],
            "composer audit",
            self.timeout_secs,
            &self.repository_path,
        );

        if let Some(error) = output.error {
            return Err(SourceError::Unavailable {
                src_kind: FindingSource::Composer,
                reason: error,
            });
        }

        // composer audit exits non-zero when advisories exist; only an
        // empty stdout means there was nothing to parse.
        if output.stdout.trim().is_empty() {
            if !output.stderr.trim().is_empty() {
                warn!("composer audit produced no output: {}", output.stderr.trim());
            }
            return Ok(Vec::new());
        }

        let json: JsonValue =
            serde_json::from_str(&output.stdout).map_err(|e| SourceError::Parse {
                src_kind: FindingSource::Composer,
                reason: e.to_string(),
            })?;

        let findings = parse_advisories(&json)?;
        info!("composer audit produced {} findings", findings.len());
        Ok(findings)
    }
}

/// Normalize a Composer audit document:
/// `{"advisories": {"<pkg>": [advisory, ...]}}`.
///
/// Package keys iterate in lexical order, advisories in array order, so
/// re-parsing the same document always yields the same sequence. Missing
/// fields resolve to sentinels; no advisory is ever dropped.
pub fn parse_advisories(json: &JsonValue) -> Result<Vec<Finding>, SourceError> {
    let advisories = json.get("advisories").ok_or_else(|| SourceError::Parse {
        src_kind: FindingSource::Composer,
        reason: "missing 'advisories' key".to_string(),
    })?;

    // A clean audit emits an empty array instead of an empty map.
    if advisories.as_array().is_some_and(|a| a.is_empty()) {
        return Ok(Vec::new());
    }

    let map = advisories.as_object().ok_or_else(|| SourceError::Parse {
        src_kind: FindingSource::Composer,
        reason: "'advisories' is neither an object nor an empty list".to_string(),
    })?;

    let mut findings = Vec::new();
    for (package, list) in map {
        let Some(items) = list.as_array() else {
            warn!("composer advisories for {} are not a list; skipping", package);
            continue;
        };
        for advisory in items {
            findings.push(normalize_advisory(package, advisory));
        }
    }
    Ok(findings)
}

fn normalize_advisory(package: &str, advisory: &JsonValue) -> Finding {
    let cve = non_empty_str(advisory.get("cve"))
        .or_else(|| non_empty_str(advisory.get("advisoryId")))
        .map(String::from);

    Finding {
        source: FindingSource::Composer,
        package: if package.is_empty() {
            Finding::NA.to_string()
        } else {
            package.to_string()
        },
        cve,
        title: non_empty_str(advisory.get("title"))
            .unwrap_or("Unknown vulnerability")
            .to_string(),
        severity: Severity::parse(
            advisory.get("severity").and_then(|s| s.as_str()).unwrap_or(""),
        ),
        affected_versions: non_empty_str(advisory.get("affectedVersions"))
            .unwrap_or(Finding::NA)
            .to_string(),
        link: non_empty_str(advisory.get("link")).map(String::from),
        fix_available: None,
        explanation: None,
        custom_info: None,
        // Keeps reportedAt / sources for the prompt builder.
        raw: advisory.clone(),
    }
}
