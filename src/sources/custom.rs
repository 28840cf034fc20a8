//! Custom CVE-intelligence feed source
//!
//! Fetches an advisories document from a deployment-specific API. The
//! provider maps its own response into the shared advisories shape before
//! it reaches the parser, so normalization stays uniform with Composer.

use crate::models::{Finding, FindingSource, Severity};
use crate::sources::{non_empty_str, AuditSource, SourceError};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

/// Custom advisory-feed source
pub struct CustomSource {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl CustomSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout_secs: 30,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn fetch(&self) -> Result<JsonValue, SourceError> {
        let agent = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(self.timeout_secs)))
            .build()
            .new_agent();

        let url = format!("{}/advisories", self.base_url.trim_end_matches('/'));
        let mut request = agent.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {}", key));
        }

        let response = request.call().map_err(|e| SourceError::Unavailable {
            src_kind: FindingSource::Custom,
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(SourceError::Unavailable {
                src_kind: FindingSource::Custom,
                reason: format!("advisory feed returned status {}", status),
            });
        }

        response
            .into_body()
            .read_json()
            .map_err(|e| SourceError::Parse {
                src_kind: FindingSource::Custom,
                reason: e.to_string(),
            })
    }
}

impl AuditSource for CustomSource {
    fn kind(&self) -> FindingSource {
        FindingSource::Custom
    }

    fn collect(&self) -> Result<Vec<Finding>, SourceError> {
        // Fail fast before any fetch when the source is selected but not
        // configured.
        if self.base_url.trim().is_empty() {
            return Err(SourceError::Configuration {
                src_kind: FindingSource::Custom,
                reason: "custom_api.base_url is not set".to_string(),
            });
        }

        let json = self.fetch()?;
        let findings = parse_advisories(&json)?;
        info!("custom advisory feed produced {} findings", findings.len());
        Ok(findings)
    }
}

/// Normalize a custom advisory document:
/// `{"advisories": {"<pkg>": [item, ...]}}`.
///
/// Severity goes through the same synonym table as the other sources when
/// the provider supplies one, and defaults to Unknown when it does not.
pub fn parse_advisories(json: &JsonValue) -> Result<Vec<Finding>, SourceError> {
    let map = json
        .get("advisories")
        .and_then(|a| a.as_object())
        .ok_or_else(|| SourceError::Parse {
            src_kind: FindingSource::Custom,
            reason: "missing 'advisories' object".to_string(),
        })?;

    let mut findings = Vec::new();
    for (package, list) in map {
        let Some(items) = list.as_array() else {
            warn!("custom advisories for {} are not a list; skipping", package);
            continue;
        };
        for item in items {
            findings.push(Finding {
                source: FindingSource::Custom,
                package: if package.is_empty() {
                    Finding::NA.to_string()
                } else {
                    package.to_string()
                },
                cve: non_empty_str(item.get("cve")).map(String::from),
                title: non_empty_str(item.get("title"))
                    .unwrap_or("Unknown vulnerability")
                    .to_string(),
                severity: Severity::parse(
                    item.get("severity").and_then(|s| s.as_str()).unwrap_or(""),
                ),
                affected_versions: non_empty_str(item.get("affectedVersions"))
                    .unwrap_or(Finding::NA)
                    .to_string(),
                link: non_empty_str(item.get("link")).map(String::from),
                fix_available: None,
                explanation: None,
                custom_info: None,
                raw: item.clone(),
            });
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_custom_item() {
        let doc = json!({
            "advisories": {
                "left-pad": [{
                    "cve": "CVE-2024-0001",
                    "title": "Example issue",
                    "link": "https://cve.example.com/CVE-2024-0001",
                    "affectedVersions": "<1.3.0",
                    "description": "An example description."
                }]
            }
        });
        let findings = parse_advisories(&doc).unwrap();
        let f = &findings[0];
        assert_eq!(f.cve.as_deref(), Some("CVE-2024-0001"));
        assert_eq!(f.severity, Severity::Unknown);
        assert_eq!(f.raw["description"], "An example description.");
    }

    #[test]
    fn test_supplied_severity_is_normalized() {
        let doc = json!({
            "advisories": { "pkg": [{ "title": "t", "severity": "Moderate" }] }
        });
        let findings = parse_advisories(&doc).unwrap();
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_unconfigured_source_fails_fast() {
        let source = CustomSource::new("", None);
        assert!(matches!(
            source.collect(),
            Err(SourceError::Configuration { .. })
        ));
    }

    #[test]
    fn test_malformed_document() {
        let doc = json!([1, 2, 3]);
        assert!(matches!(
            parse_advisories(&doc),
            Err(SourceError::Parse { .. })
        ));
    }
}
