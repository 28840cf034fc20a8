//! Finding enrichment
//!
//! Providers can fill two optional fields on a finding: a plain-language
//! `explanation` and a structured `custom_info` map keyed by CVE. Each
//! provider declares its capabilities through [`Enricher`] — a method
//! returning `None` means the capability is not supported, so the
//! coordinator never inspects concrete types.
//!
//! Failures are strictly local: a provider erroring on one finding leaves
//! that field absent, is logged, and processing moves on. Partial
//! enrichment is always a valid state.

pub mod ai;
pub mod cve_api;

pub use ai::{AiClient, AiConfig, AiExplainer, LlmBackend};
pub use cve_api::CveIntelProvider;

use crate::models::Finding;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum characters of raw advisory text forwarded to providers.
pub const RAW_EXCERPT_LIMIT: usize = 500;

pub type CustomInfo = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur while talking to an enrichment provider
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Missing API key: {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

pub type EnrichResult<T> = Result<T, EnrichError>;

/// The finding fields a provider may use to build an explanation.
#[derive(Debug, Clone)]
pub struct ExplainRequest<'a> {
    pub package: &'a str,
    pub title: &'a str,
    pub cve: Option<&'a str>,
    pub affected_versions: &'a str,
    pub link: Option<&'a str>,
    /// Length-bounded excerpt of the raw payload's description/overview.
    pub raw_excerpt: Option<String>,
}

impl<'a> ExplainRequest<'a> {
    pub fn from_finding(finding: &'a Finding) -> Self {
        Self {
            package: &finding.package,
            title: &finding.title,
            cve: finding.cve.as_deref(),
            affected_versions: &finding.affected_versions,
            link: finding.link.as_deref(),
            raw_excerpt: raw_excerpt(&finding.raw),
        }
    }
}

fn raw_excerpt(raw: &serde_json::Value) -> Option<String> {
    let text = raw
        .get("description")
        .and_then(|v| v.as_str())
        .or_else(|| raw.get("overview").and_then(|v| v.as_str()))?;
    if text.chars().count() > RAW_EXCERPT_LIMIT {
        Some(text.chars().take(RAW_EXCERPT_LIMIT).collect())
    } else {
        Some(text.to_string())
    }
}

/// An enrichment provider with optional capabilities.
pub trait Enricher {
    fn name(&self) -> &'static str;

    /// `None` when this provider does not supply explanations.
    fn try_explain(&self, _request: &ExplainRequest<'_>) -> Option<EnrichResult<String>> {
        None
    }

    /// `None` when this provider does not supply custom CVE info.
    fn try_custom_info(&self, _cve: &str) -> Option<EnrichResult<CustomInfo>> {
        None
    }
}

/// Run every finding through the providers in priority order.
///
/// First successful provider wins per field; populated fields are never
/// overwritten. Provider errors are logged and treated as "no data".
pub fn enrich_findings(findings: &mut [Finding], providers: &[Box<dyn Enricher>]) {
    for finding in findings.iter_mut() {
        for provider in providers {
            if finding.explanation.is_none() {
                let outcome = {
                    let request = ExplainRequest::from_finding(finding);
                    provider.try_explain(&request)
                };
                match outcome {
                    Some(Ok(text)) => {
                        debug!("{} explained {}", provider.name(), finding.package);
                        finding.explanation = Some(text);
                    }
                    Some(Err(e)) => {
                        warn!(
                            "{} failed to explain {}: {}",
                            provider.name(),
                            finding.package,
                            e
                        );
                    }
                    None => {}
                }
            }

            if finding.custom_info.is_none() {
                if let Some(cve) = finding.cve.as_deref().filter(|c| !c.is_empty()) {
                    match provider.try_custom_info(cve) {
                        Some(Ok(info)) => {
                            debug!("{} supplied custom info for {}", provider.name(), cve);
                            finding.custom_info = Some(info);
                        }
                        Some(Err(e)) => {
                            warn!(
                                "{} custom info lookup failed for {}: {}",
                                provider.name(),
                                cve,
                                e
                            );
                        }
                        None => {}
                    }
                }
            }
        }
    }
}

/// Shared agent builder for enrichment HTTP calls.
pub(crate) fn http_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(timeout_secs)))
        .build()
        .new_agent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FindingSource, Severity};
    use serde_json::json;

    struct StaticExplainer(&'static str);
    impl Enricher for StaticExplainer {
        fn name(&self) -> &'static str {
            "static-explainer"
        }
        fn try_explain(&self, _request: &ExplainRequest<'_>) -> Option<EnrichResult<String>> {
            Some(Ok(self.0.to_string()))
        }
    }

    struct FailingProvider;
    impl Enricher for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn try_explain(&self, _request: &ExplainRequest<'_>) -> Option<EnrichResult<String>> {
            Some(Err(EnrichError::Http("connection refused".into())))
        }
        fn try_custom_info(&self, _cve: &str) -> Option<EnrichResult<CustomInfo>> {
            Some(Err(EnrichError::Http("connection refused".into())))
        }
    }

    struct InfoProvider;
    impl Enricher for InfoProvider {
        fn name(&self) -> &'static str {
            "info"
        }
        fn try_custom_info(&self, cve: &str) -> Option<EnrichResult<CustomInfo>> {
            let mut map = CustomInfo::new();
            map.insert("vuln_status".into(), json!("confirmed"));
            map.insert("cve".into(), json!(cve));
            Some(Ok(map))
        }
    }

    fn finding(cve: Option<&str>) -> Finding {
        Finding {
            source: FindingSource::Composer,
            package: "acme/widget".into(),
            cve: cve.map(String::from),
            title: "Example".into(),
            severity: Severity::High,
            affected_versions: "<2.0".into(),
            link: None,
            fix_available: None,
            explanation: None,
            custom_info: None,
            raw: json!({ "description": "d" }),
        }
    }

    #[test]
    fn test_first_successful_provider_wins() {
        let mut findings = vec![finding(None)];
        let providers: Vec<Box<dyn Enricher>> = vec![
            Box::new(StaticExplainer("first")),
            Box::new(StaticExplainer("second")),
        ];
        enrich_findings(&mut findings, &providers);
        assert_eq!(findings[0].explanation.as_deref(), Some("first"));
    }

    #[test]
    fn test_never_overwrites_populated_fields() {
        let mut f = finding(Some("CVE-2024-1"));
        f.explanation = Some("X".into());
        let mut findings = vec![f];
        let providers: Vec<Box<dyn Enricher>> =
            vec![Box::new(StaticExplainer("replacement")), Box::new(InfoProvider)];
        enrich_findings(&mut findings, &providers);
        assert_eq!(findings[0].explanation.as_deref(), Some("X"));
        // custom_info was absent, so it does get filled
        assert!(findings[0].custom_info.is_some());
    }

    #[test]
    fn test_failure_leaves_fields_absent_and_continues() {
        let mut findings = vec![finding(Some("CVE-2024-2")), finding(None)];
        let providers: Vec<Box<dyn Enricher>> = vec![Box::new(FailingProvider)];
        enrich_findings(&mut findings, &providers);
        assert_eq!(findings[0].explanation, None);
        assert_eq!(findings[0].custom_info, None);
        assert_eq!(findings[1].explanation, None);
    }

    #[test]
    fn test_failed_provider_falls_through_to_next() {
        let mut findings = vec![finding(None)];
        let providers: Vec<Box<dyn Enricher>> = vec![
            Box::new(FailingProvider),
            Box::new(StaticExplainer("fallback")),
        ];
        enrich_findings(&mut findings, &providers);
        assert_eq!(findings[0].explanation.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_custom_info_requires_cve() {
        let mut findings = vec![finding(None)];
        let providers: Vec<Box<dyn Enricher>> = vec![Box::new(InfoProvider)];
        enrich_findings(&mut findings, &providers);
        assert_eq!(findings[0].custom_info, None);
    }

    #[test]
    fn test_enrichment_does_not_touch_immutable_fields() {
        let mut findings = vec![finding(Some("CVE-2024-3"))];
        let before_severity = findings[0].severity;
        let before_raw = findings[0].raw.clone();
        let providers: Vec<Box<dyn Enricher>> =
            vec![Box::new(StaticExplainer("e")), Box::new(InfoProvider)];
        enrich_findings(&mut findings, &providers);
        assert_eq!(findings[0].severity, before_severity);
        assert_eq!(findings[0].raw, before_raw);
    }

    #[test]
    fn test_raw_excerpt_is_bounded() {
        let long = "x".repeat(900);
        let mut f = finding(None);
        f.raw = json!({ "description": long });
        let request = ExplainRequest::from_finding(&f);
        assert_eq!(request.raw_excerpt.unwrap().chars().count(), RAW_EXCERPT_LIMIT);
    }

    #[test]
    fn test_raw_excerpt_overview_fallback() {
        let mut f = finding(None);
        f.raw = json!({ "overview": "short overview" });
        let request = ExplainRequest::from_finding(&f);
        assert_eq!(request.raw_excerpt.as_deref(), Some("short overview"));
    }
}
