//! Utility modules: retry and token accounting.

pub mod retry;
pub mod usage;
