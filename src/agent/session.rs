//! Conversation state for one logical chat.

use crate::types::{Message, Usage};
use crate::util::usage::TokenAccountant;

/// Ordered message log plus its token budget.
///
/// Append-only apart from [`Session::reset`]. The dispatch loop is the only
/// writer; it takes `&mut Session`, so one session never has two calls in
/// flight.
#[derive(Debug, Clone, Default)]
pub struct Session {
    messages: Vec<Message>,
    accountant: TokenAccountant,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a custom token ceiling and warning floor.
    pub fn with_accountant(accountant: TokenAccountant) -> Self {
        Self {
            messages: Vec::new(),
            accountant,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Last message in the log.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn record_usage(&mut self, usage: &Usage) {
        self.accountant.record(usage);
    }

    pub fn accountant(&self) -> &TokenAccountant {
        &self.accountant
    }

    pub fn total_tokens(&self) -> u64 {
        self.accountant.used()
    }

    /// Empty the log and zero the token count.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.accountant.reset();
    }
}
