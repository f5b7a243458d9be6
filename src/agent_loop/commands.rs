//! Literal control commands that bypass the backend.

use strum::{Display, EnumString};

use crate::types::UserInput;

/// A command recognized before any network call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ControlCommand {
    /// Clear the session and zero the token count.
    Reset,
    /// Re-run capability discovery.
    Refresh,
    /// Acknowledge; the presentation layer decides whether to exit.
    Quit,
}

impl ControlCommand {
    /// Recognize a command. Only text-only input is considered.
    pub fn parse(input: &UserInput) -> Option<Self> {
        if !input.is_text_only() {
            return None;
        }
        input.text.trim().parse().ok()
    }

    /// Canned confirmation returned to the caller.
    pub fn confirmation(&self) -> &'static str {
        match self {
            Self::Reset => "Conversation reset!",
            Self::Refresh => "Tools refreshed successfully!",
            Self::Quit => "Goodbye!",
        }
    }
}
