//! Configuration module for Depwarden
//!
//! Loads per-project configuration from a `depwarden.toml` in the
//! repository root. CLI flags override file values. API keys are read
//! only from environment variables, never from config files.
//!
//! # Configuration Format
//!
//! ```toml
//! # depwarden.toml
//!
//! sources = ["composer", "npm"]
//! report_threshold = "medium"
//! fail_threshold = "high"
//! empty_run = "succeed"
//! webhook_url = "https://hooks.example.com/T000/B000"
//!
//! [ai]
//! enabled = true
//! backend = "openai"
//! model = "gpt-4o-mini"
//!
//! [custom_api]
//! base_url = "https://cve-intel.example.com/api"
//! ```

use crate::pipeline::EmptyRunPolicy;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "depwarden.toml";

/// Project-level audit configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Sources to run: "composer", "npm", "custom"
    pub sources: Vec<String>,
    /// Minimum severity for a finding to appear in the report
    pub report_threshold: String,
    /// Minimum severity to fail the build; absent = gating disabled
    pub fail_threshold: Option<String>,
    pub empty_run: EmptyRunPolicy,
    pub webhook_url: Option<String>,
    pub ai: AiSettings,
    pub custom_api: CustomApiSettings,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sources: vec!["composer".to_string(), "npm".to_string()],
            report_threshold: "medium".to_string(),
            fail_threshold: None,
            empty_run: EmptyRunPolicy::default(),
            webhook_url: None,
            ai: AiSettings::default(),
            custom_api: CustomApiSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub enabled: bool,
    /// "openai" or "anthropic"
    pub backend: String,
    pub model: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "openai".to_string(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomApiSettings {
    pub base_url: Option<String>,
    /// Env var holding the API key (the key itself never lives in config)
    pub api_key_env: Option<String>,
}

/// Load configuration from `<repo>/depwarden.toml`, falling back to
/// defaults when the file is missing or unreadable.
pub fn load_config(repo_path: &Path) -> AuditConfig {
    let path = repo_path.join(CONFIG_FILE);
    if !path.exists() {
        debug!("no {} found, using defaults", CONFIG_FILE);
        return AuditConfig::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                debug!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("failed to parse {}: {}; using defaults", path.display(), e);
                AuditConfig::default()
            }
        },
        Err(e) => {
            warn!("failed to read {}: {}; using defaults", path.display(), e);
            AuditConfig::default()
        }
    }
}

/// Starter config written by `depwarden init`.
pub const STARTER_CONFIG: &str = r#"# depwarden.toml — dependency audit configuration

# Sources to run: "composer", "npm", "custom"
sources = ["composer", "npm"]

# Minimum severity for a finding to appear in the report
report_threshold = "medium"

# Minimum severity to fail the build (CI gate). Remove to disable gating.
# fail_threshold = "high"

# When every source fails to run: "succeed" (empty audit) or "fail"
empty_run = "succeed"

# Webhook that receives the plain-text notification body
# webhook_url = "https://hooks.example.com/T000/B000"

[ai]
# AI-generated explanations. Key comes from OPENAI_API_KEY or
# ANTHROPIC_API_KEY depending on backend.
enabled = true
backend = "openai"
# model = "gpt-4o-mini"

[custom_api]
# Deployment-specific CVE intelligence API
# base_url = "https://cve-intel.example.com/api"
# api_key_env = "CVE_INTEL_API_KEY"
"#;
