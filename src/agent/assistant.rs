//! Presentation-facing facade over a session and its dispatch loop.

use std::sync::Arc;

use crate::agent_loop::{DispatchLoop, RunOutcome};
use crate::config::OmniConfig;
use crate::error::OmniError;
use crate::provider::create_adapter;
use crate::tools::{
    BuiltinSource, CapabilityContext, CapabilitySource, DeclineInstall, DependencyInstaller,
    RefreshReport, ToolRegistry,
};
use crate::types::UserInput;
use crate::util::usage::TokenAccountant;

use super::session::Session;

/// One conversation with one backend.
///
/// `send` never fails: any error below it is rendered as `Error: ...`.
#[derive(Debug)]
pub struct Assistant {
    session: Session,
    dispatch: DispatchLoop,
}

impl Assistant {
    pub fn new(dispatch: DispatchLoop, session: Session) -> Self {
        Self { session, dispatch }
    }

    /// Build adapter, registry (built-in capabilities) and session for `config`.
    pub async fn from_config(config: &OmniConfig) -> Result<Self, OmniError> {
        Self::from_config_with(config, Arc::new(BuiltinSource), Arc::new(DeclineInstall)).await
    }

    /// Like [`Assistant::from_config`] with a custom capability source and installer.
    pub async fn from_config_with(
        config: &OmniConfig,
        source: Arc<dyn CapabilitySource>,
        installer: Arc<dyn DependencyInstaller>,
    ) -> Result<Self, OmniError> {
        config.validate()?;
        let adapter = create_adapter(config)?;

        let context = CapabilityContext {
            family: config.family(),
            model: config.resolved_model(),
            temperature: config.temperature,
        };
        let mut registry = ToolRegistry::new(context, source).with_installer(installer);
        registry.load().await?;

        tracing::info!(
            provider = %config.provider,
            model = %config.resolved_model(),
            tools = registry.len(),
            "Assistant ready"
        );

        let dispatch = DispatchLoop::new(adapter, registry)
            .with_retry(config.retry.to_policy())
            .with_tool_usage_display(config.show_tool_usage);
        Ok(Self::new(
            dispatch,
            Session::with_accountant(config.budget.to_accountant()),
        ))
    }

    /// Send user input and return the final response text.
    pub async fn send(&mut self, input: impl Into<UserInput>) -> String {
        match self.run(input).await {
            Ok(outcome) => outcome.response,
            Err(e) => {
                tracing::error!(error = %e, category = ?e.category(), "Turn failed");
                format!("Error: {e}")
            }
        }
    }

    /// Send user input, surfacing errors instead of rendering them.
    pub async fn run(&mut self, input: impl Into<UserInput>) -> Result<RunOutcome, OmniError> {
        self.dispatch.run(&mut self.session, input.into()).await
    }

    /// Clear the conversation and zero the token count.
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Re-run capability discovery.
    pub async fn refresh(&mut self) -> Result<RefreshReport, OmniError> {
        self.dispatch.registry_mut().refresh().await
    }

    pub fn list_capabilities(&self) -> Vec<String> {
        self.dispatch.registry().names()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn token_usage(&self) -> &TokenAccountant {
        self.session.accountant()
    }

    /// The request body the next send would start from, redacted for display.
    pub fn describe_next_request(&self) -> serde_json::Value {
        let descriptors = self.dispatch.registry().descriptors();
        self.dispatch
            .adapter()
            .describe_request(&self.session, &descriptors)
    }
}
