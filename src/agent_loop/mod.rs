//! Dispatch loop: drives one user turn to a final answer.

pub mod commands;
pub mod runner;
pub mod types;

pub use commands::ControlCommand;
pub use runner::DispatchLoop;
pub use types::{LoopState, RunOutcome, RunStatus};
