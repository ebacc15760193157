//! Extension activation.
//!
//! # Invariants
//! - A descriptor's module is evaluated at most once: the loaded flag is set
//!   before the module runs, so re-entrant activation is a no-op.
//! - Module and install failures abandon only the failing extension and are
//!   reported to the diagnostic sink, never returned.
//! - No registry borrow is held while the host instance or the module runs.

use crate::bridge::Bridge;
use crate::extension::descriptor::{ExtensionDescriptor, LoadState};
use crate::extension::module::{evaluate_module, ModuleError, ModuleExports};
use crate::extension::registry::RegistryError;
use crate::host::HostError;
use crate::loader::{trampoline, ExtensionLoader};
use crate::logging::Diagnostic;
use crate::namespace::export::Export;
use crate::namespace::path::NamespacePath;
use crate::namespace::registry::{NamespaceError, View};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Outcome of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The loaded flag was already set; nothing ran.
    AlreadyLoaded,
    Loaded,
    /// The module failed; the failure went to the diagnostic sink.
    Abandoned,
}

pub(crate) fn activate(loader: &ExtensionLoader, name: &str) -> Result<Activation, ActivationError> {
    let descriptor = loader
        .registry
        .borrow()
        .get(name)
        .cloned()
        .ok_or_else(|| ActivationError::UnknownExtension(name.to_string()))?;
    if descriptor.is_loaded() {
        debug!(
            "event=extension_activate module=loader status=skipped reason=already_loaded extension={}",
            name
        );
        return Ok(Activation::AlreadyLoaded);
    }

    descriptor
        .instance()
        .load_instance()
        .map_err(|source| ActivationError::InstanceLoad {
            extension: name.to_string(),
            source,
        })?;
    loader
        .registry
        .borrow_mut()
        .set_state(name, LoadState::Activating)?;

    let outcome = prepare_namespaces(loader, &descriptor)
        .and_then(|()| run_module(loader, &descriptor))
        .and_then(|exports| install_exports(loader, &descriptor, exports));

    match outcome {
        Ok(()) => {
            loader.registry.borrow_mut().set_state(name, LoadState::Loaded)?;
            info!(
                "event=extension_activate module=loader status=ok extension={} trampolined={}",
                name,
                descriptor.use_trampoline()
            );
            Ok(Activation::Loaded)
        }
        Err(failure) => {
            loader.sink.report(Diagnostic::error(format!(
                "Error loading extension \"{name}\": {failure}"
            )));
            loader
                .registry
                .borrow_mut()
                .set_state(name, LoadState::Abandoned)?;
            warn!(
                "event=extension_activate module=loader status=abandoned extension={}",
                name
            );
            Ok(Activation::Abandoned)
        }
    }
}

/// Clears any trampolines still installed for `descriptor`, then creates its
/// containers in both views.
fn prepare_namespaces(
    loader: &ExtensionLoader,
    descriptor: &ExtensionDescriptor,
) -> Result<(), Failure> {
    let mut namespaces = loader.namespaces.borrow_mut();
    if descriptor.state() == LoadState::Trampolined {
        trampoline::remove_owned(
            &mut namespaces,
            descriptor.name().as_str(),
            &descriptor.exposed_paths(),
        )?;
    }
    namespaces.create_namespace(View::Protected, descriptor.name());
    namespaces.create_namespace(View::Public, descriptor.name());
    Ok(())
}

fn run_module(
    loader: &ExtensionLoader,
    descriptor: &ExtensionDescriptor,
) -> Result<ModuleExports, Failure> {
    let module = loader
        .catalog
        .get(descriptor.code())
        .ok_or_else(|| ModuleError::UnknownModule(descriptor.code().to_string()))?;
    let bridge = Bridge::new(
        descriptor.name().as_str(),
        Rc::clone(descriptor.instance()),
        Rc::clone(&loader.router),
    );
    Ok(evaluate_module(module.as_ref(), &bridge)?)
}

fn install_exports(
    loader: &ExtensionLoader,
    descriptor: &ExtensionDescriptor,
    module_exports: ModuleExports,
) -> Result<(), Failure> {
    let ModuleExports {
        exports,
        entry_points,
    } = module_exports;

    let mut entry_values = Vec::with_capacity(entry_points.len());
    for (raw, export) in entry_points {
        let path = NamespacePath::parse(&raw).map_err(|source| ModuleError::InvalidEntryPoint {
            value: raw.clone(),
            source,
        })?;
        if !descriptor.entry_points().contains(&path) {
            return Err(ModuleError::UndeclaredEntryPoint(raw).into());
        }
        entry_values.push((path, export));
    }

    let target = if descriptor.use_trampoline() {
        View::Protected
    } else {
        View::Public
    };

    let mut namespaces = loader.namespaces.borrow_mut();
    // Nothing is written unless every write can succeed.
    for (path, _) in &entry_values {
        namespaces.check_assign(View::Public, path)?;
    }
    namespaces.check_assign(target, descriptor.name())?;
    if descriptor.use_trampoline() {
        for path in descriptor.exposed_paths() {
            namespaces.check_assign(View::Protected, &path)?;
        }
    }

    for (path, export) in entry_values {
        namespaces.assign(View::Public, &path, export)?;
    }
    namespaces.assign(target, descriptor.name(), Export::Namespace(exports))?;

    if descriptor.use_trampoline() {
        for path in descriptor.exposed_paths() {
            namespaces.promote(&path)?;
        }
    }
    Ok(())
}

/// Why an activation was abandoned.
#[derive(Debug)]
enum Failure {
    Module(ModuleError),
    Namespace(NamespaceError),
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module(err) => write!(f, "{err}"),
            Self::Namespace(err) => write!(f, "{err}"),
        }
    }
}

impl From<ModuleError> for Failure {
    fn from(value: ModuleError) -> Self {
        Self::Module(value)
    }
}

impl From<NamespaceError> for Failure {
    fn from(value: NamespaceError) -> Self {
        Self::Namespace(value)
    }
}

/// Activation errors that are not contained per extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    UnknownExtension(String),
    /// The host failed to load the instance; the descriptor keeps its state.
    InstanceLoad {
        extension: String,
        source: HostError,
    },
    Registry(RegistryError),
}

impl Display for ActivationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownExtension(name) => write!(f, "extension is not registered: {name}"),
            Self::InstanceLoad { extension, .. } => {
                write!(f, "failed to load instance of extension `{extension}`")
            }
            Self::Registry(err) => write!(f, "extension registry rejected activation: {err}"),
        }
    }
}

impl Error for ActivationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InstanceLoad { source, .. } => Some(source),
            Self::Registry(err) => Some(err),
            Self::UnknownExtension(_) => None,
        }
    }
}

impl From<RegistryError> for ActivationError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}
