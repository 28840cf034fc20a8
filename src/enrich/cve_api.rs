//! CVE-intelligence lookup provider
//!
//! Fetches structured metadata for a CVE id from a deployment-specific
//! intelligence API and attaches the response object as the finding's
//! custom info.

use crate::enrich::{http_agent, CustomInfo, EnrichError, EnrichResult, Enricher};
use serde_json::Value as JsonValue;

/// Custom-info provider backed by a CVE intelligence API
pub struct CveIntelProvider {
    base_url: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl CveIntelProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            agent: http_agent(30),
        }
    }

    fn lookup(&self, cve: &str) -> EnrichResult<CustomInfo> {
        let url = format!("{}/cves/{}", self.base_url.trim_end_matches('/'), cve);
        let mut request = self.agent.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {}", key));
        }

        let response = request.call().map_err(|e| EnrichError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(EnrichError::Api { status, message });
        }

        let json: JsonValue = response
            .into_body()
            .read_json()
            .map_err(|e| EnrichError::Parse(e.to_string()))?;

        match json {
            JsonValue::Object(map) => Ok(map),
            other => Err(EnrichError::Parse(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl Enricher for CveIntelProvider {
    fn name(&self) -> &'static str {
        "cve-intel"
    }

    fn try_custom_info(&self, cve: &str) -> Option<EnrichResult<CustomInfo>> {
        Some(self.lookup(cve))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::ExplainRequest;

    #[test]
    fn test_does_not_claim_explanation_capability() {
        let provider = CveIntelProvider::new("https://intel.example.com", None);
        let request = ExplainRequest {
            package: "pkg",
            title: "t",
            cve: Some("CVE-2024-1"),
            affected_versions: "N/A",
            link: None,
            raw_excerpt: None,
        };
        assert!(provider.try_explain(&request).is_none());
    }

    #[test]
    fn test_unreachable_host_is_an_error_not_a_panic() {
        let provider = CveIntelProvider::new("http://127.0.0.1:1", None);
        let result = provider.try_custom_info("CVE-2024-0001").unwrap();
        assert!(result.is_err());
    }
}
