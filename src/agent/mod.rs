//! Conversation state and the presentation-facing assistant.

pub mod assistant;
pub mod session;

pub use assistant::Assistant;
pub use session::Session;
