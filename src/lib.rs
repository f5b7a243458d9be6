//! Omni: a multi-backend, tool-calling assistant core.
//!
//! A conversation ([`agent::Session`]) is driven by a [`agent_loop::DispatchLoop`]
//! that sends it to one backend through a [`provider::ProviderAdapter`], runs
//! any capabilities the model asks for from the [`tools::ToolRegistry`], and
//! feeds the results back until the model gives a final answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use omni::agent::Assistant;
//! use omni::config::OmniConfig;
//!
//! # async fn example() -> omni::error::Result<()> {
//! let config = OmniConfig::load()?;
//! let mut assistant = Assistant::from_config(&config).await?;
//! println!("{}", assistant.send("Create a folder called notes").await);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod config;
pub mod error;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
