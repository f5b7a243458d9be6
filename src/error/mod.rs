//! Error types for Omni.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all Omni operations.
#[derive(Error, Debug)]
pub enum OmniError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure or timeout before a response arrived.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Authentication failure: {0}")]
    Authentication(String),

    /// Non-success status that is neither an auth failure nor throttling.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body failed structural validation.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Tool execution error in {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool {0} not found")]
    UnknownCapability(String),

    /// The capability source itself could not be read.
    #[error("Capability discovery failed: {0}")]
    Discovery(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for OmniError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::ConnectionFailure(err.to_string())
        }
    }
}

impl OmniError {
    /// Create an API error for a non-success status.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// HTTP-equivalent status carried by this error, if any.
    ///
    /// Connection failures have no status; throttling maps to 429.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::ConnectionFailure(_) => ErrorCategory::Network,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) | Self::MalformedResponse(_) => ErrorCategory::Parse,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                408 => ErrorCategory::Network,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } | Self::InvalidArgument(_) => ErrorCategory::ToolExecution,
            Self::UnknownCapability(_) => ErrorCategory::UnknownCapability,
            Self::Discovery(_) | Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable under the default status set.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::UnknownCapability => RecoverySuggestion::RefreshCapabilities,
            ErrorCategory::Parse => RecoverySuggestion::RephraseRequest,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OmniError>;
