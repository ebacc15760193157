//! Extension loader.
//!
//! # Responsibility
//! - Bootstrap the host once and register the extensions it enumerates.
//! - Activate eager extensions and install trampolines for lazy ones.
//! - Serve the public namespace through [`ExtensionLoader::resolve`], firing
//!   trampolines on first access.
//!
//! # Invariants
//! - `initialize` and `get_extensions` are each called exactly once.
//! - No `RefCell` borrow is held across a call into a module, the host, or a
//!   method export, so those may read the namespace again.
//! - A trampoline that fails to activate leaves its paths unresolved; it is
//!   not retried.
//! - Only host initialization, host enumeration and eager instance loading
//!   abort startup. Any other per-extension problem skips that extension.

pub mod activator;
pub mod trampoline;

pub use activator::{Activation, ActivationError};
pub use trampoline::TrampolineError;

use crate::bridge::{AppLifecycle, LogLifecycle, RuntimeMessageRouter};
use crate::config::DEFAULT_RUNTIME_NAME;
use crate::extension::descriptor::{ExtensionDescriptor, LoadState};
use crate::extension::module::{ExtensionModule, ModuleCatalog};
use crate::extension::registry::ExtensionRegistry;
use crate::host::variables::{RuntimeVariables, ENCODED_BUNDLE_KEY, RUNTIME_NAME_KEY};
use crate::host::{HostError, HostRuntime};
use crate::logging::{error_chain, DiagnosticSink, LogSink};
use crate::namespace::export::{Export, ThrownError};
use crate::namespace::path::NamespacePath;
use crate::namespace::registry::{Lookup, NamespaceError, NamespaceRegistry, PublicBinding, View};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Result of a public read.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Container,
    Value(Export),
}

impl Resolution {
    pub fn export(&self) -> Option<&Export> {
        match self {
            Self::Value(export) => Some(export),
            Self::Container => None,
        }
    }

    /// Containers and exported tables.
    pub fn is_container(&self) -> bool {
        match self {
            Self::Container => true,
            Self::Value(export) => export.is_container(),
        }
    }
}

pub struct LoaderBuilder {
    host: Rc<dyn HostRuntime>,
    catalog: ModuleCatalog,
    lifecycle: Option<Rc<dyn AppLifecycle>>,
    sink: Option<Rc<dyn DiagnosticSink>>,
    variables: RuntimeVariables,
}

impl LoaderBuilder {
    pub fn catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn module(mut self, key: impl Into<String>, module: impl ExtensionModule + 'static) -> Self {
        self.catalog.register(key, module);
        self
    }

    pub fn lifecycle(mut self, lifecycle: Rc<dyn AppLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn sink(mut self, sink: Rc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replaces the initial runtime variables.
    pub fn variables(mut self, variables: RuntimeVariables) -> Self {
        self.variables = variables;
        self
    }

    /// Initializes the host, registers its extensions and activates or
    /// trampolines each of them in enumeration order.
    pub fn start(self) -> Result<ExtensionLoader, LoaderError> {
        let lifecycle = self.lifecycle.unwrap_or_else(|| Rc::new(LogLifecycle));
        let loader = ExtensionLoader {
            host: self.host,
            catalog: self.catalog,
            router: Rc::new(RuntimeMessageRouter::new(lifecycle)),
            sink: self.sink.unwrap_or_else(|| Rc::new(LogSink)),
            registry: RefCell::new(ExtensionRegistry::new()),
            namespaces: RefCell::new(NamespaceRegistry::new()),
            variables: RefCell::new(self.variables),
        };
        loader.boot()?;
        Ok(loader)
    }
}

pub struct ExtensionLoader {
    host: Rc<dyn HostRuntime>,
    catalog: ModuleCatalog,
    router: Rc<RuntimeMessageRouter>,
    sink: Rc<dyn DiagnosticSink>,
    registry: RefCell<ExtensionRegistry>,
    namespaces: RefCell<NamespaceRegistry>,
    variables: RefCell<RuntimeVariables>,
}

impl ExtensionLoader {
    pub fn builder(host: Rc<dyn HostRuntime>) -> LoaderBuilder {
        LoaderBuilder {
            host,
            catalog: ModuleCatalog::new(),
            lifecycle: None,
            sink: None,
            variables: RuntimeVariables::new().with(RUNTIME_NAME_KEY, DEFAULT_RUNTIME_NAME),
        }
    }

    fn boot(&self) -> Result<(), LoaderError> {
        let variables = self.variables.borrow().clone();
        self.host
            .initialize(&variables)
            .map_err(LoaderError::HostInitialize)?;
        let extensions = self
            .host
            .get_extensions()
            .map_err(LoaderError::HostEnumerate)?;
        let enumerated = extensions.len();

        let mut descriptors = Vec::with_capacity(enumerated);
        for extension in extensions {
            let name = extension.name.clone();
            match ExtensionDescriptor::from_host(extension) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => warn!(
                    "event=extension_register module=loader status=skipped extension={} error={}",
                    name,
                    error_chain(&err)
                ),
            }
        }
        {
            let mut registry = self.registry.borrow_mut();
            for descriptor in descriptors {
                let name = descriptor.name().to_string();
                if let Err(err) = registry.register(descriptor) {
                    warn!(
                        "event=extension_register module=loader status=skipped extension={} error={}",
                        name, err
                    );
                }
            }
        }

        let names = self.registry.borrow().names().to_vec();
        for name in &names {
            let use_trampoline = self
                .registry
                .borrow()
                .get(name)
                .is_some_and(ExtensionDescriptor::use_trampoline);
            if use_trampoline {
                if let Err(err) = trampoline::install_trampoline(self, name) {
                    warn!(
                        "event=trampoline_install module=loader status=skipped extension={} error={}",
                        name,
                        error_chain(&err)
                    );
                    // Drop whatever part of the install went in.
                    if let Err(err) = trampoline::delete_trampoline(self, name) {
                        warn!(
                            "event=trampoline_delete module=loader status=error extension={} error={}",
                            name, err
                        );
                    }
                }
            } else {
                activator::activate(self, name).map_err(LoaderError::Activation)?;
            }
        }

        info!(
            "event=loader_start module=loader status=ok enumerated={} registered={}",
            enumerated,
            names.len()
        );
        Ok(())
    }

    /// Reads `path` from the public namespace, firing any trampoline on the
    /// way. Returns `None` for missing paths, invalid paths, and failed
    /// trampolines.
    pub fn resolve(&self, path: &str) -> Option<Resolution> {
        match NamespacePath::parse(path) {
            Ok(path) => self.resolve_path(&path),
            Err(err) => {
                debug!(
                    "event=namespace_resolve module=loader status=invalid_path error={}",
                    err
                );
                None
            }
        }
    }

    pub fn resolve_path(&self, path: &NamespacePath) -> Option<Resolution> {
        let mut fired = BTreeSet::new();
        loop {
            let lookup = self.namespaces.borrow().lookup(View::Public, path);
            match lookup {
                Lookup::Missing => return None,
                Lookup::Container => return Some(Resolution::Container),
                Lookup::Value(export) => return Some(Resolution::Value(export)),
                Lookup::Pending { extension, at } => {
                    if !fired.insert(extension.clone()) {
                        warn!(
                            "event=trampoline_fire module=loader status=error reason=still_pending extension={} path={}",
                            extension, at
                        );
                        return None;
                    }
                    if let Err(err) = trampoline::fire_trampoline(self, &extension, &at) {
                        error!(
                            "event=trampoline_fire module=loader status=error extension={} path={} error={}",
                            extension,
                            at,
                            error_chain(&err)
                        );
                        return None;
                    }
                }
            }
        }
    }

    /// Calls the method exported at `path` with JSON arguments.
    pub fn call(&self, path: &str, args: &[Value]) -> Result<Value, CallError> {
        match self.resolve(path) {
            Some(Resolution::Value(Export::Method(method))) => {
                method.call(args).map_err(CallError::Thrown)
            }
            Some(_) => Err(CallError::NotCallable(path.to_string())),
            None => Err(CallError::Unresolved(path.to_string())),
        }
    }

    /// Writes a public value, as the hosted application would.
    pub fn assign(&self, path: &NamespacePath, export: Export) -> Result<(), NamespaceError> {
        self.namespaces
            .borrow_mut()
            .assign(View::Public, path, export)
    }

    /// Deletes a public binding, as the hosted application would.
    pub fn remove(&self, path: &NamespacePath) -> Result<Option<PublicBinding>, NamespaceError> {
        self.namespaces.borrow_mut().remove_public(path)
    }

    /// Enumerates public children of `parent` (`None` for the root) without
    /// firing trampolines.
    pub fn keys(&self, parent: Option<&NamespacePath>) -> Vec<String> {
        self.namespaces.borrow().children(View::Public, parent)
    }

    /// Non-triggering lookup in either view.
    pub fn inspect(&self, view: View, path: &NamespacePath) -> Lookup {
        self.namespaces.borrow().lookup(view, path)
    }

    /// Activates `name` now, whatever its activation mode.
    pub fn activate(&self, name: &str) -> Result<Activation, ActivationError> {
        activator::activate(self, name)
    }

    pub fn state(&self, name: &str) -> Option<LoadState> {
        self.registry.borrow().state(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state(name).is_some_and(LoadState::is_loaded)
    }

    /// Registered extension names in enumeration order.
    pub fn extension_names(&self) -> Vec<String> {
        self.registry.borrow().names().to_vec()
    }

    pub fn runtime_variables(&self) -> RuntimeVariables {
        self.variables.borrow().clone()
    }

    pub fn router(&self) -> &Rc<RuntimeMessageRouter> {
        &self.router
    }

    /// Records the encoded bundle of an incoming service request and pushes
    /// the runtime variables to the host.
    pub fn handle_service_request(&self, encoded_bundle: &str) -> Result<(), HostError> {
        let variables = {
            let mut variables = self.variables.borrow_mut();
            variables.insert(ENCODED_BUNDLE_KEY, encoded_bundle);
            variables.clone()
        };
        self.host.update_runtime_variables(&variables)?;
        info!(
            "event=service_request module=loader status=ok variables={}",
            variables.len()
        );
        Ok(())
    }
}

impl Debug for ExtensionLoader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionLoader")
            .field("catalog", &self.catalog)
            .field("router", &self.router)
            .field("registry", &self.registry)
            .field("namespaces", &self.namespaces)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

/// Fatal startup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    HostInitialize(HostError),
    HostEnumerate(HostError),
    Activation(ActivationError),
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HostInitialize(_) => write!(f, "host initialization failed"),
            Self::HostEnumerate(_) => write!(f, "host extension enumeration failed"),
            Self::Activation(_) => write!(f, "eager extension activation failed"),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HostInitialize(err) | Self::HostEnumerate(err) => Some(err),
            Self::Activation(err) => Some(err),
        }
    }
}

/// Errors of [`ExtensionLoader::call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Unresolved(String),
    NotCallable(String),
    Thrown(ThrownError),
}

impl Display for CallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved(path) => write!(f, "namespace path does not resolve: {path}"),
            Self::NotCallable(path) => write!(f, "namespace path is not a method: {path}"),
            Self::Thrown(err) => write!(f, "method threw: {err}"),
        }
    }
}

impl Error for CallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Thrown(err) => Some(err),
            _ => None,
        }
    }
}
