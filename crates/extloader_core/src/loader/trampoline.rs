//! Lazy activation through trampoline bindings.
//!
//! # Invariants
//! - A trampoline is installed at every entry point, then at the extension's
//!   own name.
//! - Firing removes every trampoline of the extension before activating it,
//!   so a trampoline fires at most once.
//! - A failed firing does not restore the trampolines.

use crate::extension::descriptor::LoadState;
use crate::extension::registry::RegistryError;
use crate::loader::activator::{activate, Activation, ActivationError};
use crate::loader::ExtensionLoader;
use crate::namespace::path::NamespacePath;
use crate::namespace::registry::{NamespaceError, NamespaceRegistry, PublicBinding, View};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub(crate) fn install_trampoline(loader: &ExtensionLoader, name: &str) -> Result<(), TrampolineError> {
    let (paths, state) = {
        let registry = loader.registry.borrow();
        let descriptor = registry
            .get(name)
            .ok_or_else(|| TrampolineError::UnknownExtension(name.to_string()))?;
        (descriptor.exposed_paths(), descriptor.state())
    };
    if state != LoadState::Unloaded {
        debug!(
            "event=trampoline_install module=loader status=skipped extension={} state={}",
            name, state
        );
        return Ok(());
    }

    {
        let mut namespaces = loader.namespaces.borrow_mut();
        for path in &paths {
            namespaces.create_namespace(View::Public, path);
            namespaces
                .install_trampoline(path, name)
                .map_err(|source| TrampolineError::Namespace {
                    extension: name.to_string(),
                    source,
                })?;
        }
    }
    loader
        .registry
        .borrow_mut()
        .set_state(name, LoadState::Trampolined)?;
    debug!(
        "event=trampoline_install module=loader status=ok extension={} paths={}",
        name,
        paths.len()
    );
    Ok(())
}

/// Removes the trampolines `name` owns. Other bindings are left alone.
pub(crate) fn delete_trampoline(loader: &ExtensionLoader, name: &str) -> Result<(), TrampolineError> {
    let paths = loader
        .registry
        .borrow()
        .get(name)
        .map(|descriptor| descriptor.exposed_paths())
        .ok_or_else(|| TrampolineError::UnknownExtension(name.to_string()))?;

    remove_owned(&mut loader.namespaces.borrow_mut(), name, &paths).map_err(|source| {
        TrampolineError::Namespace {
            extension: name.to_string(),
            source,
        }
    })
}

/// Removes the public trampolines `name` owns at `paths`.
pub(crate) fn remove_owned(
    namespaces: &mut NamespaceRegistry,
    name: &str,
    paths: &[NamespacePath],
) -> Result<(), NamespaceError> {
    for path in paths {
        let owned = matches!(
            namespaces.public_binding(path),
            Some(PublicBinding::Trampoline(owner)) if owner == name
        );
        if owned {
            namespaces.remove_public(path)?;
        }
    }
    Ok(())
}

/// Handles a read that met the trampoline of `name` at `at`.
pub(crate) fn fire_trampoline(
    loader: &ExtensionLoader,
    name: &str,
    at: &NamespacePath,
) -> Result<Activation, TrampolineError> {
    debug!(
        "event=trampoline_fire module=loader status=start extension={} path={}",
        name, at
    );
    delete_trampoline(loader, name)?;
    Ok(activate(loader, name)?)
}

/// Trampoline install and firing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrampolineError {
    UnknownExtension(String),
    Namespace {
        extension: String,
        source: NamespaceError,
    },
    Registry(RegistryError),
    Activation(ActivationError),
}

impl Display for TrampolineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownExtension(name) => write!(f, "extension is not registered: {name}"),
            Self::Namespace { extension, .. } => {
                write!(f, "trampoline of extension `{extension}` could not be updated")
            }
            Self::Registry(err) => write!(f, "extension registry rejected trampoline: {err}"),
            Self::Activation(_) => write!(f, "trampoline activation failed"),
        }
    }
}

impl Error for TrampolineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Namespace { source, .. } => Some(source),
            Self::Registry(err) => Some(err),
            Self::Activation(err) => Some(err),
            Self::UnknownExtension(_) => None,
        }
    }
}

impl From<RegistryError> for TrampolineError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<ActivationError> for TrampolineError {
    fn from(value: ActivationError) -> Self {
        Self::Activation(value)
    }
}
