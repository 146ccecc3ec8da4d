//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::rules::MAX_GOTO_LOOPS;

/// Default location of the rule file.
pub const DEFAULT_RULES_PATH: &str = "./data/rules.csv";

/// Default acknowledgement for [`EmptyChainPolicy::Acknowledge`].
pub const DEFAULT_ACK_TEXT: &str = "Okay.";

/// What to do when a rule matched but its whole chain produced no text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EmptyChainPolicy {
    /// Clear the context and ask the fallback responder.
    #[default]
    Fallback,
    /// Reply with fixed text and keep the context the chain set.
    Acknowledge(String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum rules applied per turn, GoTo jumps included.
    pub max_goto_loops: usize,
    pub empty_chain: EmptyChainPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_goto_loops: MAX_GOTO_LOOPS,
            empty_chain: EmptyChainPolicy::default(),
        }
    }
}

/// Process configuration for the rulebot binary.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// CSV rule file.
    pub rules_path: PathBuf,
    pub engine: EngineConfig,
    /// `None` means no API key was found; the simulated responder is used.
    pub llm: Option<LlmConfig>,
    /// Directory for daily rolling log files, if file logging is wanted.
    pub log_dir: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            engine: EngineConfig::default(),
            llm: None,
            log_dir: None,
        }
    }
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup (the environment, or a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let rules_path = get("RULEBOT_RULES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_PATH));

        let max_goto_loops = match get("RULEBOT_MAX_GOTO_LOOPS") {
            None => MAX_GOTO_LOOPS,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "RULEBOT_MAX_GOTO_LOOPS".into(),
                        message: format!("expected a positive integer, got '{}'", raw),
                    });
                }
            },
        };

        let ack_text = get("RULEBOT_ACK_TEXT").unwrap_or_else(|| DEFAULT_ACK_TEXT.to_string());
        let empty_chain = match get("RULEBOT_EMPTY_CHAIN").as_deref().map(str::to_lowercase) {
            None => EmptyChainPolicy::Fallback,
            Some(mode) if mode == "fallback" => EmptyChainPolicy::Fallback,
            Some(mode) if mode == "ack" || mode == "acknowledge" => {
                EmptyChainPolicy::Acknowledge(ack_text)
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "RULEBOT_EMPTY_CHAIN".into(),
                    message: format!("expected 'fallback' or 'ack', got '{}'", other),
                });
            }
        };

        let backend = match get("RULEBOT_LLM_BACKEND") {
            None => LlmBackend::Anthropic,
            Some(name) => LlmBackend::parse(&name).ok_or_else(|| ConfigError::InvalidValue {
                key: "RULEBOT_LLM_BACKEND".into(),
                message: format!("unknown backend '{}'", name),
            })?,
        };

        let llm = get(backend.api_key_var()).map(|key| {
            let model = get("RULEBOT_MODEL").unwrap_or_else(|| backend.default_model().to_string());
            let mut config = LlmConfig::new(backend, secrecy::SecretString::from(key), model);
            if let Some(preamble) = get("RULEBOT_SYSTEM_PROMPT") {
                config.preamble = preamble;
            }
            config
        });

        let log_dir = get("RULEBOT_LOG_DIR").map(PathBuf::from);

        Ok(Self {
            rules_path,
            engine: EngineConfig {
                max_goto_loops,
                empty_chain,
            },
            llm,
            log_dir,
        })
    }
}
