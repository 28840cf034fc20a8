//! npm audit source
//!
//! Runs `npm audit --json` and normalizes both output shapes: the modern
//! `vulnerabilities` map (npm v7+) and the legacy `advisories` map
//! (npm v6).

use crate::models::{Finding, FindingSource, Severity};
use crate::sources::{non_empty_str, run_audit_tool, AuditSource, SourceError};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

static CVE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn cve_pattern() -> &'static Regex {
    CVE_PATTERN.get_or_init(|| Regex::new(r"(?i)CVE-\d{4}-\d{4,}").unwrap())
}

/// npm dependency audit source
pub struct NpmSource {
    repository_path: PathBuf,
    timeout_secs: u64,
    production_only: bool,
}

impl NpmSource {
    pub fn new(repository_path: impl Into<PathBuf>) -> Self {
        Self {
            repository_path: repository_path.into(),
            timeout_secs: 120,
            production_only: false,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Only check production dependencies
    pub fn with_production_only(mut self, prod_only: bool) -> Self {
        self.production_only = prod_only;
        self
    }

    fn check_prerequisites(&self) -> Result<(), String> {
        if !self.repository_path.join("package.json").exists() {
            return Err("no package.json found".to_string());
        }
        let has_lock = self.repository_path.join("package-lock.json").exists()
            || self.repository_path.join("npm-shrinkwrap.json").exists();
        if !has_lock {
            return Err(
                "no package-lock.json found. npm audit requires a lock file; run 'npm install' first."
                    .to_string(),
            );
        }
        Ok(())
    }
}

impl AuditSource for NpmSource {
    fn kind(&self) -> FindingSource {
        FindingSource::Npm
    }

    fn collect(&self) -> Result<Vec<Finding>, SourceError> {
        if let Err(reason) = self.check_prerequisites() {
            return Err(SourceError::Unavailable {
                src_kind: FindingSource::Npm,
                reason,
            });
        }

        let mut cmd = vec!["npm", "audit", "--json"];
        if self.production_only {
            cmd.push("--omit=dev");
        }

        let output = run_audit_tool(&cmd, "npm audit", self.timeout_secs, &self.repository_path);

        if let Some(error) = output.error {
            return Err(SourceError::Unavailable {
                src_kind: FindingSource::Npm,
                reason: error,
            });
        }

        // npm audit exits non-zero when vulnerabilities are found.
        if output.stdout.trim().is_empty() {
            if !output.stderr.trim().is_empty() {
                warn!("npm audit produced no output: {}", output.stderr.trim());
            }
            return Ok(Vec::new());
        }

        let json: JsonValue =
            serde_json::from_str(&output.stdout).map_err(|e| SourceError::Parse {
                src_kind: FindingSource::Npm,
                reason: e.to_string(),
            })?;

        let findings = parse_audit(&json)?;
        info!("npm audit produced {} findings", findings.len());
        Ok(findings)
    }
}

/// Normalize an npm audit document, dispatching on shape.
pub fn parse_audit(json: &JsonValue) -> Result<Vec<Finding>, SourceError> {
    if let Some(vulns) = json.get("vulnerabilities").and_then(|v| v.as_object()) {
        return Ok(vulns
            .iter()
            .map(|(package, details)| normalize_modern(package, details))
            .collect());
    }
    if let Some(advisories) = json.get("advisories").and_then(|a| a.as_object()) {
        return Ok(advisories
            .values()
            .map(normalize_legacy)
            .collect());
    }
    Err(SourceError::Parse {
        src_kind: FindingSource::Npm,
        reason: "neither 'vulnerabilities' nor 'advisories' present".to_string(),
    })
}

/// Modern shape: `vulnerabilities[pkg] -> details` with a nested `via`
/// list whose entries are either plain strings (references to other
/// vulnerable packages — never a CVE or link source) or advisory objects.
fn normalize_modern(package: &str, details: &JsonValue) -> Finding {
    let via: &[JsonValue] = details
        .get("via")
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);

    let (cve, link) = scan_via(via);

    // Title joins the advisory objects' titles (names as fallback);
    // plain-string entries carry no advisory text of their own.
    let parts: Vec<&str> = via
        .iter()
        .filter_map(|v| v.as_object())
        .filter_map(|o| {
            non_empty_str(o.get("title")).or_else(|| non_empty_str(o.get("name")))
        })
        .collect();
    let title = if parts.is_empty() {
        non_empty_str(details.get("name"))
            .unwrap_or("Unknown Vulnerability")
            .to_string()
    } else {
        parts.join(", ")
    };

    let fix_available = details
        .get("fixAvailable")
        .and_then(|f| f.as_object())
        .and_then(|o| {
            match (non_empty_str(o.get("name")), non_empty_str(o.get("version"))) {
                (Some(name), Some(version)) => Some(format!("{}@{}", name, version)),
                _ => None,
            }
        });

    Finding {
        source: FindingSource::Npm,
        package: if package.is_empty() {
            Finding::NA.to_string()
        } else {
            package.to_string()
        },
        cve,
        title,
        severity: Severity::parse(details.get("severity").and_then(|s| s.as_str()).unwrap_or("")),
        affected_versions: non_empty_str(details.get("range"))
            .unwrap_or(Finding::NA)
            .to_string(),
        link,
        fix_available,
        explanation: None,
        custom_info: None,
        raw: details.clone(),
    }
}

/// Extract (cve, link) from the `via` list.
///
/// Search order: first object entry carrying a `cve` field, else first
/// object entry whose `url` or `title` matches a CVE id. The link is the
/// first object url seen, independent of where the CVE came from.
fn scan_via(via: &[JsonValue]) -> (Option<String>, Option<String>) {
    let objects = via.iter().filter_map(|v| v.as_object());

    let link = objects
        .clone()
        .find_map(|o| non_empty_str(o.get("url")))
        .map(String::from);

    let cve = objects
        .clone()
        .find_map(|o| non_empty_str(o.get("cve")))
        .map(String::from)
        .or_else(|| {
            objects.clone().find_map(|o| {
                let url = o.get("url").and_then(|u| u.as_str()).unwrap_or("");
                let title = o.get("title").and_then(|t| t.as_str()).unwrap_or("");
                cve_pattern()
                    .find(url)
                    .or_else(|| cve_pattern().find(title))
                    .map(|m| m.as_str().to_uppercase())
            })
        });

    (cve, link)
}

/// Legacy shape: `advisories[id] -> details`, direct field mapping.
fn normalize_legacy(details: &JsonValue) -> Finding {
    let fix_available = non_empty_str(details.get("patched_versions"))
        // npm's "no patch exists" sentinel
        .filter(|p| *p != "<0.0.0")
        .map(String::from);

    Finding {
        source: FindingSource::Npm,
        package: non_empty_str(details.get("module_name"))
            .unwrap_or(Finding::NA)
            .to_string(),
        cve: details
            .get("cves")
            .and_then(|c| c.as_array())
            .and_then(|a| a.iter().find_map(|v| v.as_str()))
            .map(String::from),
        title: non_empty_str(details.get("title"))
            .unwrap_or("Unknown vulnerability")
            .to_string(),
        severity: Severity::parse(details.get("severity").and_then(|s| s.as_str()).unwrap_or("")),
        affected_versions: non_empty_str(details.get("vulnerable_versions"))
            .unwrap_or(Finding::NA)
            .to_string(),
        link: non_empty_str(details.get("url")).map(String::from),
        fix_available,
        explanation: None,
        custom_info: None,
        raw: details.clone(),
    }
}
