//! Core run types for the dispatch loop.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{ToolInvocationRequest, Turn};

/// Where a run is in its cycle.
///
/// `AwaitingSend -> Sent -> HasToolCalls -> Executing -> AwaitingSend`, or
/// `Sent -> Final -> Done`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingSend,
    Sent(Turn),
    HasToolCalls(Turn),
    Executing {
        /// Assistant text of the turn, attached to the first request only.
        text: Option<String>,
        pending: VecDeque<ToolInvocationRequest>,
    },
    Final(Turn),
    Done(RunOutcome),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The backend produced a final answer.
    Completed,
    /// A control command answered without contacting the backend.
    Command,
    /// The backend produced an unusable turn.
    Failed,
}

/// Result of one `run` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Text shown to the user.
    pub response: String,
    /// Outbound calls made (retries not counted).
    pub rounds: u32,
}

impl RunOutcome {
    pub fn completed(response: impl Into<String>, rounds: u32) -> Self {
        Self {
            status: RunStatus::Completed,
            response: response.into(),
            rounds,
        }
    }

    pub fn command(response: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Command,
            response: response.into(),
            rounds: 0,
        }
    }

    pub fn failed(reason: &str, rounds: u32) -> Self {
        Self {
            status: RunStatus::Failed,
            response: format!("Error: {reason}"),
            rounds,
        }
    }
}
