//! Error types for rulebot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule load error: {0}")]
    RuleLoad(#[from] RuleLoadError),

    #[error("Rule admin error: {0}")]
    Admin(#[from] AdminError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors that stop a rule file from being read at all.
///
/// Problems with individual rows are not errors; they are reported as
/// [`crate::rules::Diagnostic`]s and the row is skipped.
#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("Failed to read rule file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write rule file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Rule administration errors (edit / upload / delete).
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("Rule {id} not found")]
    NotFound { id: String },

    #[error("Uploaded rule file rejected: {reason}")]
    RejectedUpload { reason: String },

    #[error("Rule file error: {0}")]
    Load(#[from] RuleLoadError),
}

/// A single record that cannot become a [`crate::rules::Rule`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule has no Rule_ID")]
    MissingId,

    #[error("rule {id} uses the '*' pattern without a Context_Required")]
    WildcardWithoutContext { id: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Result type alias for rulebot.
pub type Result<T> = std::result::Result<T, Error>;
