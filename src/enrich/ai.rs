//! LLM-backed explanation provider
//!
//! Unified chat client for OpenAI and Anthropic backends over ureq (sync
//! HTTP, no async runtime). BYOK — API keys come from environment
//! variables, never from config files.

use crate::enrich::{
    http_agent, EnrichError, EnrichResult, Enricher, ExplainRequest,
};
use serde::{Deserialize, Serialize};
use std::env;

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    #[default]
    OpenAi,
    Anthropic,
}

impl LlmBackend {
    pub fn env_key(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "gpt-4o-mini",
            LlmBackend::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    pub fn api_url(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "https://api.openai.com/v1/chat/completions",
            LlmBackend::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }

    /// Parse a config string; unrecognized values fall back to OpenAI.
    pub fn from_config(raw: &str) -> LlmBackend {
        match raw.trim().to_lowercase().as_str() {
            "anthropic" => LlmBackend::Anthropic,
            _ => LlmBackend::OpenAi,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub backend: LlmBackend,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            model: None,
            max_tokens: 512,
            temperature: 0.2,
            timeout_secs: 30,
        }
    }
}

impl AiConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.backend.default_model())
    }
}

/// Unified LLM client — sync HTTP via ureq
pub struct AiClient {
    config: AiConfig,
    api_key: String,
    agent: ureq::Agent,
}

impl AiClient {
    pub fn new(config: AiConfig, api_key: impl Into<String>) -> Self {
        let agent = http_agent(config.timeout_secs);
        Self {
            config,
            api_key: api_key.into(),
            agent,
        }
    }

    pub fn from_env(config: AiConfig) -> EnrichResult<Self> {
        let env_key = config.backend.env_key();
        let api_key = env::var(env_key).map_err(|_| EnrichError::MissingApiKey {
            env_var: env_key.to_string(),
        })?;
        Ok(Self::new(config, api_key))
    }

    pub fn backend(&self) -> LlmBackend {
        self.config.backend
    }

    pub fn model(&self) -> &str {
        self.config.model()
    }

    /// Generate a response (sync)
    pub fn generate(&self, messages: Vec<Message>, system: Option<&str>) -> EnrichResult<String> {
        match self.config.backend {
            LlmBackend::OpenAi => self.generate_openai(messages, system),
            LlmBackend::Anthropic => self.generate_anthropic(messages, system),
        }
    }

    fn generate_openai(
        &self,
        mut messages: Vec<Message>,
        system: Option<&str>,
    ) -> EnrichResult<String> {
        if let Some(sys) = system {
            messages.insert(0, Message::system(sys));
        }

        let body = OpenAiRequest {
            model: self.config.model().to_string(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .agent
            .post(self.config.backend.api_url())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)
            .map_err(|e| EnrichError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(EnrichError::Api { status, message });
        }

        let resp: OpenAiResponse = response
            .into_body()
            .read_json()
            .map_err(|e| EnrichError::Parse(e.to_string()))?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EnrichError::Parse("no response choices".to_string()))
    }

    fn generate_anthropic(
        &self,
        messages: Vec<Message>,
        system: Option<&str>,
    ) -> EnrichResult<String> {
        let messages: Vec<_> = messages
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();

        let body = AnthropicRequest {
            model: self.config.model().to_string(),
            max_tokens: self.config.max_tokens,
            messages,
            system: system.map(|s| s.to_string()),
            temperature: Some(self.config.temperature),
        };

        let response = self
            .agent
            .post(self.config.backend.api_url())
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .send_json(&body)
            .map_err(|e| EnrichError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(EnrichError::Api { status, message });
        }

        let resp: AnthropicResponse = response
            .into_body()
            .read_json()
            .map_err(|e| EnrichError::Parse(e.to_string()))?;

        resp.content
            .into_iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text)
            .ok_or_else(|| EnrichError::Parse("no text content in response".to_string()))
    }
}

// OpenAI API types
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

// Anthropic API types
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

const SYSTEM_PROMPT: &str = "You are a security analyst helping developers understand \
dependency vulnerabilities. Explain what the vulnerability is, how it could affect an \
application that depends on the package, and what the upgrade path is. Plain language, \
no markdown, at most 120 words.";

/// Explanation provider backed by an LLM
pub struct AiExplainer {
    client: AiClient,
}

impl AiExplainer {
    pub fn new(client: AiClient) -> Self {
        Self { client }
    }

    pub fn from_env(config: AiConfig) -> EnrichResult<Self> {
        Ok(Self::new(AiClient::from_env(config)?))
    }

    fn build_prompt(request: &ExplainRequest<'_>) -> String {
        let mut prompt = format!(
            "Explain this dependency vulnerability:\n\nPackage: {}\nTitle: {}\n",
            request.package, request.title
        );
        if let Some(cve) = request.cve {
            prompt.push_str(&format!("CVE: {}\n", cve));
        }
        prompt.push_str(&format!("Affected versions: {}\n", request.affected_versions));
        if let Some(link) = request.link {
            prompt.push_str(&format!("Advisory: {}\n", link));
        }
        if let Some(excerpt) = &request.raw_excerpt {
            prompt.push_str(&format!("\nAdvisory details:\n{}\n", excerpt));
        }
        prompt
    }
}

impl Enricher for AiExplainer {
    fn name(&self) -> &'static str {
        "ai-explainer"
    }

    fn try_explain(&self, request: &ExplainRequest<'_>) -> Option<EnrichResult<String>> {
        let prompt = Self::build_prompt(request);
        Some(
            self.client
                .generate(vec![Message::user(prompt)], Some(SYSTEM_PROMPT))
                .map(|text| text.trim().to_string()),
        )
    }
}
