//! Capability sources: where the registry discovers plugins.
//!
//! A source enumerates [`PluginEntry`] values, each pairing a stable plugin id
//! with a constructor. The registry decides which entries to instantiate and
//! which resulting capabilities pass validation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::descriptor::BackendFamily;
use super::tool::Capability;
use crate::error::OmniError;

/// Backend context a capability is constructed for.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityContext {
    pub family: BackendFamily,
    pub model: String,
    pub temperature: f64,
}

impl CapabilityContext {
    pub fn new(family: BackendFamily, model: impl Into<String>) -> Self {
        Self {
            family,
            model: model.into(),
            temperature: 0.7,
        }
    }
}

/// An optional external dependency a plugin needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// What is missing (executable, library, service).
    pub name: String,
    /// What to install to provide it.
    pub package: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
        }
    }
}

/// Why a plugin constructor did not produce a capability.
#[derive(Debug, thiserror::Error)]
pub enum PluginInitError {
    #[error("missing dependency {} (package {})", .0.name, .0.package)]
    MissingDependency(Dependency),
    #[error("{0}")]
    Failed(String),
}

type Constructor =
    dyn Fn(&CapabilityContext) -> Result<Arc<dyn Capability>, PluginInitError> + Send + Sync;

/// One discoverable plugin.
#[derive(Clone)]
pub struct PluginEntry {
    id: String,
    is_abstract: bool,
    constructor: Arc<Constructor>,
}

impl PluginEntry {
    pub fn new<F>(id: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&CapabilityContext) -> Result<Arc<dyn Capability>, PluginInitError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.into(),
            is_abstract: false,
            constructor: Arc::new(constructor),
        }
    }

    /// Entry for a capability that needs no context and cannot fail to build.
    pub fn from_capability(capability: Arc<dyn Capability>) -> Self {
        let id = capability.name().to_string();
        Self::new(id, move |_| Ok(capability.clone()))
    }

    /// Mark as a template that other plugins build on; never instantiated.
    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn instantiate(
        &self,
        ctx: &CapabilityContext,
    ) -> Result<Arc<dyn Capability>, PluginInitError> {
        (self.constructor)(ctx)
    }
}

impl std::fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEntry")
            .field("id", &self.id)
            .field("is_abstract", &self.is_abstract)
            .finish()
    }
}

/// Enumerates plugins. A read failure here aborts the whole load.
#[async_trait]
pub trait CapabilitySource: Send + Sync {
    async fn discover(&self) -> Result<Vec<PluginEntry>, OmniError>;
}

/// A fixed, caller-supplied list of plugins.
///
/// The list can be swapped at runtime, which is what a refresh picks up.
#[derive(Debug, Default)]
pub struct StaticSource {
    entries: Mutex<Vec<PluginEntry>>,
}

impl StaticSource {
    pub fn new(entries: Vec<PluginEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Add a plugin; visible on the next discovery.
    pub fn push(&self, entry: PluginEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

#[async_trait]
impl CapabilitySource for StaticSource {
    async fn discover(&self) -> Result<Vec<PluginEntry>, OmniError> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .map_err(|_| OmniError::Discovery("plugin list lock poisoned".into()))
    }
}

/// Accept/decline prompt and installer for missing plugin dependencies.
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    /// Ask whether `dependency` should be installed for `plugin_id`.
    async fn confirm_install(&self, plugin_id: &str, dependency: &Dependency) -> bool;

    /// Install it. An error means the plugin is skipped.
    async fn install(&self, dependency: &Dependency) -> Result<(), OmniError>;
}

/// Non-interactive installer that declines every prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineInstall;

#[async_trait]
impl DependencyInstaller for DeclineInstall {
    async fn confirm_install(&self, _plugin_id: &str, _dependency: &Dependency) -> bool {
        false
    }

    async fn install(&self, dependency: &Dependency) -> Result<(), OmniError> {
        Err(OmniError::Configuration(format!(
            "installation of {} declined",
            dependency.package
        )))
    }
}

/// Installer that runs a shell command template, `{package}` substituted.
#[derive(Debug, Clone)]
pub struct CommandInstaller<P> {
    command_template: String,
    prompt: P,
}

impl<P> CommandInstaller<P>
where
    P: Fn(&str, &Dependency) -> bool + Send + Sync,
{
    pub fn new(command_template: impl Into<String>, prompt: P) -> Self {
        Self {
            command_template: command_template.into(),
            prompt,
        }
    }

    pub fn command_for(&self, dependency: &Dependency) -> String {
        self.command_template.replace("{package}", &dependency.package)
    }
}

#[async_trait]
impl<P> DependencyInstaller for CommandInstaller<P>
where
    P: Fn(&str, &Dependency) -> bool + Send + Sync,
{
    async fn confirm_install(&self, plugin_id: &str, dependency: &Dependency) -> bool {
        (self.prompt)(plugin_id, dependency)
    }

    async fn install(&self, dependency: &Dependency) -> Result<(), OmniError> {
        let command = self.command_for(dependency);
        tracing::info!(command = %command, "Installing missing dependency");
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(OmniError::Configuration(format!(
                "`{command}` failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::FnCapability;
    use crate::tools::types::ToolParameters;

    fn echo() -> Arc<dyn Capability> {
        Arc::new(FnCapability::new(
            "echo",
            "Echo",
            ToolParameters::empty(),
            |_args| async move { Ok(serde_json::json!("echo")) },
        ))
    }

    #[tokio::test]
    async fn static_source_sees_pushed_entries() {
        let source = StaticSource::new(vec![PluginEntry::from_capability(echo())]);
        assert_eq!(source.discover().await.unwrap().len(), 1);

        source.push(PluginEntry::from_capability(echo()).into_abstract());
        let entries = source.discover().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].is_abstract());
    }

    #[test]
    fn command_installer_substitutes_package() {
        let installer = CommandInstaller::new("cargo install {package}", |_: &str, _: &Dependency| true);
        let dep = Dependency::new("rg", "ripgrep");
        assert_eq!(installer.command_for(&dep), "cargo install ripgrep");
    }

    #[tokio::test]
    async fn decline_install_never_accepts() {
        let dep = Dependency::new("rg", "ripgrep");
        assert!(!DeclineInstall.confirm_install("search_files", &dep).await);
        assert!(DeclineInstall.install(&dep).await.is_err());
    }
}
