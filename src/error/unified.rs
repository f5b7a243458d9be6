//! Error classification and recovery.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Server,
    Api,
    Configuration,
    Parse,
    ToolExecution,
    UnknownCapability,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    CheckToolImplementation,
    RefreshCapabilities,
    RephraseRequest,
    ContactSupport,
}
