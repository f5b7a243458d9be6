//! Capability registry: discovery, validation, lookup and execution.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::arguments::ToolArguments;
use super::descriptor::{BackendFamily, CapabilityDescriptor};
use super::source::{
    CapabilityContext, CapabilitySource, DeclineInstall, DependencyInstaller, PluginEntry,
    PluginInitError,
};
use super::tool::Capability;
use super::validation::validate_arguments;
use crate::error::OmniError;
use crate::provider::format::tool_result_to_string;
use crate::types::{ToolInvocationRequest, ToolResult};

/// Names that appeared or disappeared across a refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Newly available names, sorted.
    pub added: Vec<String>,
    /// Names that are no longer available, sorted.
    pub removed: Vec<String>,
}

impl RefreshReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone)]
struct Registered {
    descriptor: CapabilityDescriptor,
    capability: Arc<dyn Capability>,
}

/// Validated capabilities for one backend context.
///
/// Each session owns its own registry, since descriptor validation and
/// capability construction depend on the backend family.
pub struct ToolRegistry {
    context: CapabilityContext,
    source: Arc<dyn CapabilitySource>,
    installer: Arc<dyn DependencyInstaller>,
    loaded: Vec<Registered>,
}

impl ToolRegistry {
    pub fn new(context: CapabilityContext, source: Arc<dyn CapabilitySource>) -> Self {
        Self {
            context,
            source,
            installer: Arc::new(DeclineInstall),
            loaded: Vec::new(),
        }
    }

    /// Use `installer` to answer missing-dependency prompts.
    pub fn with_installer(mut self, installer: Arc<dyn DependencyInstaller>) -> Self {
        self.installer = installer;
        self
    }

    pub fn context(&self) -> &CapabilityContext {
        &self.context
    }

    pub fn family(&self) -> BackendFamily {
        self.context.family
    }

    /// Discover, instantiate and validate every capability the source offers.
    ///
    /// Bad descriptors and unsatisfied dependencies skip that capability only.
    /// A discovery failure aborts the call and leaves the current set intact.
    pub async fn load(&mut self) -> Result<Vec<CapabilityDescriptor>, OmniError> {
        let entries = self.source.discover().await?;
        let total = entries.len();
        self.loaded = self.instantiate_all(entries).await;

        tracing::info!(
            family = %self.context.family,
            loaded = self.loaded.len(),
            discovered = total,
            "Capabilities loaded"
        );
        Ok(self.descriptors())
    }

    /// Re-run discovery and report the difference to the previous load.
    ///
    /// Capabilities present before and after keep their existing instance.
    pub async fn refresh(&mut self) -> Result<RefreshReport, OmniError> {
        let entries = self.source.discover().await?;
        let previous: HashMap<String, Registered> = self
            .loaded
            .drain(..)
            .map(|r| (r.descriptor.name.clone(), r))
            .collect();
        let mut fresh = self.instantiate_all(entries).await;

        for registered in &mut fresh {
            if let Some(existing) = previous.get(&registered.descriptor.name) {
                *registered = existing.clone();
            }
        }

        let before: BTreeSet<&String> = previous.keys().collect();
        let after: BTreeSet<&String> = fresh.iter().map(|r| &r.descriptor.name).collect();
        let report = RefreshReport {
            added: after.difference(&before).map(|s| s.to_string()).collect(),
            removed: before.difference(&after).map(|s| s.to_string()).collect(),
        };

        tracing::info!(
            added = report.added.len(),
            removed = report.removed.len(),
            total = fresh.len(),
            "Capabilities refreshed"
        );
        self.loaded = fresh;
        Ok(report)
    }

    async fn instantiate_all(&self, entries: Vec<PluginEntry>) -> Vec<Registered> {
        let mut loaded: Vec<Registered> = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();

        for entry in entries {
            if entry.is_abstract() {
                tracing::debug!(plugin = entry.id(), "Skipping abstract plugin");
                continue;
            }

            let Some(capability) = self.instantiate(&entry).await else {
                continue;
            };

            let descriptor = CapabilityDescriptor::from_capability(capability.as_ref());
            if let Err(reason) = descriptor.validate(self.context.family) {
                tracing::warn!(plugin = entry.id(), reason = %reason, "Skipping capability");
                continue;
            }
            if !seen.insert(descriptor.name.clone()) {
                tracing::warn!(
                    plugin = entry.id(),
                    name = %descriptor.name,
                    "Skipping capability with duplicate name"
                );
                continue;
            }

            tracing::debug!(name = %descriptor.name, "Loaded capability");
            loaded.push(Registered {
                descriptor,
                capability,
            });
        }

        loaded
    }

    async fn instantiate(&self, entry: &PluginEntry) -> Option<Arc<dyn Capability>> {
        let dependency = match entry.instantiate(&self.context) {
            Ok(capability) => return Some(capability),
            Err(PluginInitError::MissingDependency(dependency)) => dependency,
            Err(PluginInitError::Failed(message)) => {
                tracing::warn!(plugin = entry.id(), error = %message, "Skipping capability");
                return None;
            }
        };

        if !self.installer.confirm_install(entry.id(), &dependency).await {
            tracing::warn!(
                plugin = entry.id(),
                dependency = %dependency.name,
                "Skipping capability: dependency not installed"
            );
            return None;
        }
        if let Err(e) = self.installer.install(&dependency).await {
            tracing::warn!(plugin = entry.id(), error = %e, "Dependency installation failed");
            return None;
        }

        match entry.instantiate(&self.context) {
            Ok(capability) => Some(capability),
            Err(e) => {
                tracing::warn!(plugin = entry.id(), error = %e, "Skipping capability after install");
                None
            }
        }
    }

    /// Look up a capability by name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.loaded
            .iter()
            .find(|r| r.descriptor.name == name)
            .map(|r| r.capability.clone())
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.loaded.iter().map(|r| r.descriptor.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.loaded
            .iter()
            .map(|r| r.descriptor.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Run one invocation. Every failure becomes an error-flagged result.
    pub async fn execute(&self, request: &ToolInvocationRequest) -> ToolResult {
        let Some(registered) = self
            .loaded
            .iter()
            .find(|r| r.descriptor.name == request.capability_name)
        else {
            let err = OmniError::UnknownCapability(request.capability_name.clone());
            tracing::warn!(tool = %request.capability_name, "Unknown capability requested");
            return ToolResult::failure(request, err.to_string());
        };

        if let Err(message) = validate_arguments(&request.arguments, &registered.descriptor.parameters)
        {
            let err = OmniError::InvalidArgument(message);
            tracing::warn!(tool = %request.capability_name, error = %err, "Rejected tool arguments");
            return ToolResult::failure(request, err.to_string());
        }

        let args = ToolArguments::new(request.arguments.clone());
        match registered.capability.execute(&args).await {
            Ok(value) => ToolResult::success(request, tool_result_to_string(&value)),
            Err(e) => {
                tracing::warn!(tool = %request.capability_name, error = %e, "Tool execution failed");
                ToolResult::failure(request, e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("context", &self.context)
            .field("names", &self.names())
            .finish()
    }
}
