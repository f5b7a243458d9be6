//! Shared test helpers and scripted adapter.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use omni::agent::Session;
use omni::error::OmniError;
use omni::provider::{BackendFamily, CapabilityDescriptor, ProviderAdapter};
use omni::tools::{
    Capability, CapabilityContext, FnCapability, PluginEntry, StaticSource, ToolParameters,
    ToolRegistry,
};
use omni::types::{Message, ToolInvocationRequest, Turn, Usage};

/// Observations made by a [`ScriptedAdapter`], readable after the adapter
/// has been moved into a dispatch loop.
#[derive(Clone, Default)]
pub struct AdapterLog {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl AdapterLog {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Session contents as each call saw them.
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

/// An adapter that returns queued results instead of calling a backend.
pub struct ScriptedAdapter {
    family: BackendFamily,
    script: Mutex<VecDeque<Result<Turn, OmniError>>>,
    log: AdapterLog,
}

impl ScriptedAdapter {
    pub fn new(family: BackendFamily) -> Self {
        Self {
            family,
            script: Mutex::new(VecDeque::new()),
            log: AdapterLog::default(),
        }
    }

    pub fn log(&self) -> AdapterLog {
        self.log.clone()
    }

    pub fn then(self, result: Result<Turn, OmniError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    /// Queue a final text answer.
    pub fn then_text(self, text: &str) -> Self {
        self.then(Ok(Turn::final_text(text)))
    }

    /// Queue a turn requesting one capability.
    pub fn then_call(self, name: &str, args: Value) -> Self {
        let arguments = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let call = ToolInvocationRequest::new(ToolInvocationRequest::fresh_id(), name, arguments);
        self.then(Ok(Turn::with_invocations("", vec![call])))
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn family(&self) -> BackendFamily {
        self.family
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn send(
        &self,
        session: &Session,
        _capabilities: &[CapabilityDescriptor],
    ) -> Result<Turn, OmniError> {
        self.log.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .seen
            .lock()
            .unwrap()
            .push(session.messages().to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Turn::final_text("script exhausted")))
    }

    fn describe_request(
        &self,
        session: &Session,
        _capabilities: &[CapabilityDescriptor],
    ) -> Value {
        json!({ "messages": session.len() })
    }
}

pub fn usage(total: u32) -> Usage {
    Usage {
        input_tokens: total / 2,
        output_tokens: total - total / 2,
        total_tokens: total,
    }
}

/// A capability that always returns `output`.
pub fn constant_capability(name: &str, output: &str) -> Arc<dyn Capability> {
    let output = output.to_string();
    Arc::new(FnCapability::new(
        name,
        format!("Returns {output}"),
        ToolParameters::empty(),
        move |_args| {
            let output = output.clone();
            async move { Ok(json!(output)) }
        },
    ))
}

/// A capability with an arbitrary (possibly invalid) descriptor.
pub fn raw_capability(name: &str, description: &str, schema: Value) -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(
        name,
        description,
        ToolParameters::from_schema(schema),
        |_args| async move { Ok(json!("ok")) },
    ))
}

pub fn context(family: BackendFamily) -> CapabilityContext {
    CapabilityContext::new(family, "scripted")
}

/// A loaded registry over a fixed capability list.
pub async fn registry_with(
    family: BackendFamily,
    capabilities: Vec<Arc<dyn Capability>>,
) -> ToolRegistry {
    let entries = capabilities
        .into_iter()
        .map(PluginEntry::from_capability)
        .collect();
    let mut registry = ToolRegistry::new(context(family), Arc::new(StaticSource::new(entries)));
    registry.load().await.unwrap();
    registry
}
