//! Fallback responders for messages no rule answers.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//! - **Simulated**: offline placeholder used when no API key is configured
//!
//! Every responder honours the same contract: `respond()` always yields
//! displayable text. Provider failures are logged and turned into an apology
//! line; they never reach the engine as errors.

mod rig_responder;
mod simulated;

pub use rig_responder::RigResponder;
pub use simulated::SimulatedResponder;

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Default system prompt for the fallback model.
pub const DEFAULT_PREAMBLE: &str = "You are a friendly, concise chat assistant. \
     Answer the user's message in a few sentences.";

/// Text shown to the user when the fallback provider fails.
pub const DEFAULT_APOLOGY: &str =
    "Sorry, I can't answer that right now. Please try again in a moment.";

/// The fallback capability: turn a raw user message into reply text.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Reply to `input`. Must not fail; errors become user-presentable text.
    async fn respond(&self, input: &str) -> String;
}

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    /// Parse a backend name as used in configuration.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Some(LlmBackend::Anthropic),
            "openai" | "gpt" => Some(LlmBackend::OpenAi),
            _ => None,
        }
    }

    /// Environment variable holding this backend's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "claude-sonnet-4-20250514",
            LlmBackend::OpenAi => "gpt-4o",
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "anthropic",
            LlmBackend::OpenAi => "openai",
        }
    }
}

/// Configuration for creating an LLM-backed responder.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub preamble: String,
    pub max_tokens: u64,
    pub apology: String,
}

impl LlmConfig {
    pub fn new(backend: LlmBackend, api_key: secrecy::SecretString, model: impl Into<String>) -> Self {
        Self {
            backend,
            api_key,
            model: model.into(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            max_tokens: 1024,
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

/// Create an LLM-backed responder from configuration.
///
/// Must be called inside a tokio runtime: building a rig agent spawns its
/// tool server task.
pub fn create_responder(config: &LlmConfig) -> Result<Arc<dyn Responder>, LlmError> {
    if config.api_key.expose_secret().trim().is_empty() {
        return Err(LlmError::AuthFailed {
            provider: config.backend.provider_name().to_string(),
        });
    }

    match config.backend {
        LlmBackend::Anthropic => create_anthropic_responder(config),
        LlmBackend::OpenAi => create_openai_responder(config),
    }
}

fn create_anthropic_responder(config: &LlmConfig) -> Result<Arc<dyn Responder>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let agent = client
        .agent(&config.model)
        .preamble(&config.preamble)
        .max_tokens(config.max_tokens)
        .build();
    tracing::info!("Fallback responder: Anthropic (model: {})", config.model);
    Ok(Arc::new(RigResponder::new(
        agent,
        "anthropic",
        &config.model,
        &config.apology,
    )))
}

fn create_openai_responder(config: &LlmConfig) -> Result<Arc<dyn Responder>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let agent = client
        .agent(&config.model)
        .preamble(&config.preamble)
        .max_tokens(config.max_tokens)
        .build();
    tracing::info!("Fallback responder: OpenAI (model: {})", config.model);
    Ok(Arc::new(RigResponder::new(
        agent,
        "openai",
        &config.model,
        &config.apology,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_anthropic_responder() {
        // rig-core clients accept any string as API key at construction time.
        // The actual auth failure happens when making a request.
        let config = LlmConfig::new(
            LlmBackend::Anthropic,
            secrecy::SecretString::from("test-key"),
            "claude-3-5-sonnet-latest",
        );
        let responder = create_responder(&config);
        assert!(responder.is_ok());
        assert_eq!(responder.unwrap().name(), "anthropic");
    }

    #[tokio::test]
    async fn test_create_openai_responder() {
        let config = LlmConfig::new(
            LlmBackend::OpenAi,
            secrecy::SecretString::from("sk-test"),
            "gpt-4o",
        );
        let responder = create_responder(&config);
        assert!(responder.is_ok());
        assert_eq!(responder.unwrap().name(), "openai");
    }

    #[test]
    fn test_blank_key_rejected() {
        let config = LlmConfig::new(
            LlmBackend::OpenAi,
            secrecy::SecretString::from("  "),
            "gpt-4o",
        );
        assert!(matches!(
            create_responder(&config),
            Err(LlmError::AuthFailed { .. })
        ));
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(LlmBackend::parse("Anthropic"), Some(LlmBackend::Anthropic));
        assert_eq!(LlmBackend::parse(" openai "), Some(LlmBackend::OpenAi));
        assert_eq!(LlmBackend::parse("gemini"), None);
    }
}
