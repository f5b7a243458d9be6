//! Normalized result of one adapter call.

use super::message::ToolInvocationRequest;
use super::usage::Usage;

/// What a backend answered for one outbound call.
///
/// Ephemeral: the dispatch loop consumes it and records what it needs in the
/// session. A turn is `done` when it carries no invocation requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub assistant_text: String,
    pub invocations: Vec<ToolInvocationRequest>,
    pub done: bool,
    /// Usage reported by the backend, when the family reports any.
    pub usage: Option<Usage>,
    /// Set on a terminal error turn (e.g. an unparseable tool-call block).
    pub error: Option<String>,
}

impl Turn {
    /// A final answer.
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            assistant_text: text.into(),
            invocations: Vec::new(),
            done: true,
            usage: None,
            error: None,
        }
    }

    /// A turn requesting capability invocations. With none it is final.
    pub fn with_invocations(text: impl Into<String>, invocations: Vec<ToolInvocationRequest>) -> Self {
        let done = invocations.is_empty();
        Self {
            assistant_text: text.into(),
            invocations,
            done,
            usage: None,
            error: None,
        }
    }

    /// A terminal error turn: the run stops and surfaces `reason`.
    pub fn failed(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::final_text(text)
        }
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
