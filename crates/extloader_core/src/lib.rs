//! Extension activation and namespace virtualization engine.
//! Hosts enumerate extensions; this crate activates them eagerly or on first
//! access and publishes their exports under a dotted namespace.

pub mod bridge;
pub mod config;
pub mod extension;
pub mod host;
pub mod loader;
pub mod logging;
pub mod namespace;

pub use bridge::{AppLifecycle, Bridge, RuntimeMessage, RuntimeMessageRouter, EXIT_MESSAGE};
pub use config::{ConfigError, LoaderConfig, LoggingConfig};
pub use extension::descriptor::{ExtensionDescriptor, LoadState};
pub use extension::manifest::{ExtensionManifest, ManifestSet};
pub use extension::module::{ExtensionModule, ModuleCatalog, ModuleError, ModuleExports};
pub use host::loopback::{InstanceHandler, LoopbackInstance, Outbox};
pub use host::static_host::StaticHost;
pub use host::{ExtensionInstance, HostError, HostExtension, HostRuntime, RuntimeVariables};
pub use loader::{
    Activation, ActivationError, CallError, ExtensionLoader, LoaderBuilder, LoaderError,
    Resolution,
};
pub use logging::{
    default_log_level, init_logging, logging_status, Diagnostic, DiagnosticSink, LogSink,
    Severity,
};
pub use namespace::export::{Export, ExportsTable, Method, ThrownError};
pub use namespace::path::{NamespacePath, PathError};
pub use namespace::registry::{Lookup, NamespaceError, View};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
