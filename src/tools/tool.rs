//! Capability trait and closure-based capability wrapper.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::arguments::ToolArguments;
use super::types::ToolParameters;
use crate::error::OmniError;

/// Core capability trait. Implement to expose a function to the model.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Capability name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Execute with parsed arguments.
    ///
    /// A JSON string result is passed back to the model verbatim; any other
    /// value is serialized.
    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, OmniError>;
}

type Handler = dyn Fn(ToolArguments) -> BoxFuture<'static, Result<serde_json::Value, OmniError>>
    + Send
    + Sync;

/// Closure-based capability for quick definitions.
pub struct FnCapability {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<Handler>,
}

impl FnCapability {
    /// Create a capability from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, OmniError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Capability for FnCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, OmniError> {
        (self.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for FnCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCapability")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_capability_executes() {
        let greet = FnCapability::new(
            "greet",
            "Greet a person",
            ToolParameters::object().string("name", "Name", true).build(),
            |args| async move {
                let name = args.get_str("name")?;
                Ok(serde_json::json!(format!("Hello, {name}!")))
            },
        );

        let mut map = serde_json::Map::new();
        map.insert("name".into(), "World".into());
        let out = greet.execute(&ToolArguments::new(map)).await.unwrap();

        assert_eq!(greet.name(), "greet");
        assert_eq!(out, "Hello, World!");
    }
}
