//! Capability system: plugin discovery, validation and execution.

pub mod arguments;
pub mod builtin;
pub mod descriptor;
pub mod registry;
pub mod source;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use builtin::BuiltinSource;
pub use descriptor::{BackendFamily, CapabilityDescriptor, DescriptorRejection};
pub use registry::{RefreshReport, ToolRegistry};
pub use source::{
    CapabilityContext, CapabilitySource, CommandInstaller, DeclineInstall, Dependency,
    DependencyInstaller, PluginEntry, PluginInitError, StaticSource,
};
pub use tool::{Capability, FnCapability};
pub use types::ToolParameters;
