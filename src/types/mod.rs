//! Core types for Omni.

pub mod message;
pub mod turn;
pub mod usage;

pub use message::*;
pub use turn::*;
pub use usage::*;
