//! Backend adapters: one implementation per backend family.

pub mod format;
pub mod http;
pub mod sanitize;
pub mod structured;
pub mod tagged;

use async_trait::async_trait;
use bon::Builder;

use crate::agent::session::Session;
use crate::config::OmniConfig;
use crate::error::OmniError;
use crate::types::Turn;

pub use crate::tools::descriptor::{BackendFamily, CapabilityDescriptor};
pub use structured::StructuredToolAdapter;
pub use tagged::TaggedTextAdapter;

/// Connection and sampling settings shared by every adapter.
#[derive(Debug, Clone, Builder, PartialEq)]
pub struct AdapterSettings {
    #[builder(into)]
    pub model: String,
    #[builder(into)]
    pub base_url: String,
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(default = 0.7)]
    pub temperature: f64,
    #[builder(default = 0.9)]
    pub top_p: f64,
}

/// Core trait implemented by each backend family.
///
/// `send` performs exactly one outbound call; retrying is the caller's job.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn family(&self) -> BackendFamily;

    /// The model this adapter talks to.
    fn model(&self) -> &str;

    /// Send the session and capability list, returning the normalized turn.
    async fn send(
        &self,
        session: &Session,
        capabilities: &[CapabilityDescriptor],
    ) -> Result<Turn, OmniError>;

    /// The request body `send` would transmit, with binary payloads redacted.
    fn describe_request(
        &self,
        session: &Session,
        capabilities: &[CapabilityDescriptor],
    ) -> serde_json::Value;
}

/// Build the adapter for the configured provider.
///
/// Structured providers need an API key.
pub fn create_adapter(config: &OmniConfig) -> Result<Box<dyn ProviderAdapter>, OmniError> {
    let provider = config.provider;
    let settings = AdapterSettings::builder()
        .model(config.resolved_model())
        .base_url(config.resolved_base_url())
        .maybe_api_key(config.api_key())
        .temperature(config.temperature)
        .top_p(config.top_p)
        .build();

    match provider.family() {
        BackendFamily::Structured => {
            if settings.api_key.as_deref().map_or(true, str::is_empty) {
                return Err(OmniError::Authentication(format!(
                    "Missing {} for provider {provider}",
                    provider.api_key_env().unwrap_or("API key")
                )));
            }
            Ok(Box::new(StructuredToolAdapter::new(settings)))
        }
        BackendFamily::Tagged => Ok(Box::new(TaggedTextAdapter::new(settings))),
    }
}
