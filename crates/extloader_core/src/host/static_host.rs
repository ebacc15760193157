//! Host runtime over registered plugin manifests.
//!
//! # Responsibility
//! - Serve a fixed manifest set through [`HostRuntime`].
//! - Create one instance per extension through a caller-supplied factory.
//! - Keep the runtime variables pushed by the loader.
//!
//! # Invariants
//! - Trampoline flags are computed once, when the host is built.
//! - `get_extensions` fails with `HostError::NotInitialized` before
//!   `initialize`.

use crate::extension::manifest::{load_metadata_dir, ExtensionManifest, ManifestSet, MetadataError};
use crate::host::variables::RuntimeVariables;
use crate::host::{ExtensionInstance, HostError, HostExtension, HostRuntime};
use log::info;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::rc::Rc;

/// Builds the live instance for one manifest.
pub type InstanceFactory =
    Box<dyn Fn(&ExtensionManifest) -> Result<Rc<dyn ExtensionInstance>, HostError>>;

pub struct StaticHost {
    manifests: Vec<ExtensionManifest>,
    factory: InstanceFactory,
    variables: RefCell<RuntimeVariables>,
    initialized: Cell<bool>,
}

impl StaticHost {
    pub fn new(mut manifests: ManifestSet, factory: InstanceFactory) -> Self {
        manifests.apply_trampoline_flags();
        Self {
            manifests: manifests.into_manifests(),
            factory,
            variables: RefCell::new(RuntimeVariables::new()),
            initialized: Cell::new(false),
        }
    }

    /// Registers every manifest found in `metadata_dir`.
    pub fn from_metadata_dir(
        metadata_dir: &Path,
        extension_dir: &Path,
        factory: InstanceFactory,
    ) -> Result<Self, MetadataError> {
        let mut set = ManifestSet::new();
        set.register_all(load_metadata_dir(metadata_dir, extension_dir)?);
        Ok(Self::new(set, factory))
    }

    /// Manifests in name order, with their computed trampoline flags.
    pub fn manifests(&self) -> &[ExtensionManifest] {
        &self.manifests
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn runtime_variable(&self, key: &str) -> Option<String> {
        self.variables.borrow().get(key).map(str::to_string)
    }

    pub fn runtime_variables(&self) -> RuntimeVariables {
        self.variables.borrow().clone()
    }
}

impl Debug for StaticHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticHost")
            .field("manifests", &self.manifests)
            .field("variables", &self.variables)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl HostRuntime for StaticHost {
    fn initialize(&self, variables: &RuntimeVariables) -> Result<(), HostError> {
        self.variables.borrow_mut().replace_all(variables);
        self.initialized.set(true);
        info!(
            "event=host_init module=host status=ok extensions={} variables={}",
            self.manifests.len(),
            variables.len()
        );
        Ok(())
    }

    fn get_extensions(&self) -> Result<Vec<HostExtension>, HostError> {
        if !self.is_initialized() {
            return Err(HostError::NotInitialized);
        }
        self.manifests
            .iter()
            .map(|manifest| -> Result<HostExtension, HostError> {
                Ok(HostExtension {
                    name: manifest.name.clone(),
                    code: manifest.module_key(),
                    entry_points: manifest.entry_points.clone(),
                    use_trampoline: manifest.use_trampoline,
                    instance: (self.factory)(manifest)?,
                })
            })
            .collect()
    }

    fn update_runtime_variables(&self, variables: &RuntimeVariables) -> Result<(), HostError> {
        self.variables.borrow_mut().replace_all(variables);
        Ok(())
    }
}
