//! Extension descriptor and load state.
//!
//! # Invariants
//! - `name` and every entry point are valid dotted paths.
//! - The load state only moves forward (see [`LoadState::can_transition_to`]).
//! - Once the loaded flag is set it is never cleared.

use crate::host::{ExtensionInstance, HostExtension};
use crate::namespace::path::{NamespacePath, PathError};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Per-extension activation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    /// Lazy accessors are installed on the public view.
    Trampolined,
    /// The module is being evaluated.
    Activating,
    Loaded,
    /// Module evaluation failed; the extension stays unusable.
    Abandoned,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Trampolined => "trampolined",
            Self::Activating => "activating",
            Self::Loaded => "loaded",
            Self::Abandoned => "abandoned",
        }
    }

    /// The loaded flag: set as soon as activation starts running the module.
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Activating | Self::Loaded | Self::Abandoned)
    }

    pub fn can_transition_to(self, next: LoadState) -> bool {
        matches!(
            (self, next),
            (Self::Unloaded, Self::Trampolined)
                | (Self::Unloaded, Self::Activating)
                | (Self::Trampolined, Self::Activating)
                | (Self::Activating, Self::Loaded)
                | (Self::Activating, Self::Abandoned)
        )
    }
}

impl Display for LoadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-enumerated extension with its activation state.
#[derive(Clone)]
pub struct ExtensionDescriptor {
    name: NamespacePath,
    code: String,
    entry_points: Vec<NamespacePath>,
    use_trampoline: bool,
    instance: Rc<dyn ExtensionInstance>,
    state: LoadState,
}

impl ExtensionDescriptor {
    /// Validates the host record and builds an `Unloaded` descriptor.
    pub fn from_host(extension: HostExtension) -> Result<Self, DescriptorError> {
        let name = NamespacePath::parse(&extension.name).map_err(|source| {
            DescriptorError::InvalidName {
                name: extension.name.clone(),
                source,
            }
        })?;
        let entry_points = extension
            .entry_points
            .iter()
            .map(|raw| {
                NamespacePath::parse(raw).map_err(|source| DescriptorError::InvalidEntryPoint {
                    extension: extension.name.clone(),
                    entry_point: raw.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            code: extension.code,
            entry_points,
            use_trampoline: extension.use_trampoline,
            instance: extension.instance,
            state: LoadState::Unloaded,
        })
    }

    pub fn name(&self) -> &NamespacePath {
        &self.name
    }

    /// Module key resolved against the module catalog.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn entry_points(&self) -> &[NamespacePath] {
        &self.entry_points
    }

    pub fn use_trampoline(&self) -> bool {
        self.use_trampoline
    }

    pub fn instance(&self) -> &Rc<dyn ExtensionInstance> {
        &self.instance
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Entry points in declaration order, then the extension's own name.
    pub fn exposed_paths(&self) -> Vec<NamespacePath> {
        let mut paths = self.entry_points.clone();
        paths.push(self.name.clone());
        paths
    }

    pub(crate) fn set_state(&mut self, state: LoadState) {
        self.state = state;
    }
}

impl Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionDescriptor")
            .field("name", &self.name)
            .field("code", &self.code)
            .field("entry_points", &self.entry_points)
            .field("use_trampoline", &self.use_trampoline)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Host record validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    InvalidName {
        name: String,
        source: PathError,
    },
    InvalidEntryPoint {
        extension: String,
        entry_point: String,
        source: PathError,
    },
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName { name, .. } => write!(f, "extension name is invalid: {name}"),
            Self::InvalidEntryPoint {
                extension,
                entry_point,
                ..
            } => write!(
                f,
                "entry point `{entry_point}` of extension `{extension}` is invalid"
            ),
        }
    }
}

impl Error for DescriptorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName { source, .. } | Self::InvalidEntryPoint { source, .. } => {
                Some(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DescriptorError, ExtensionDescriptor, LoadState};
    use crate::host::loopback::{InstanceHandler, LoopbackInstance, Outbox};
    use crate::host::HostExtension;
    use std::rc::Rc;

    struct Silent;

    impl InstanceHandler for Silent {
        fn handle_message(&self, _message: &str, _outbox: &Outbox<'_>) {}

        fn handle_sync_message(&self, _message: &str) -> Option<String> {
            None
        }
    }

    fn host_extension(name: &str, entry_points: &[&str]) -> HostExtension {
        HostExtension {
            name: name.to_string(),
            code: "libtest.so".to_string(),
            entry_points: entry_points.iter().map(|e| e.to_string()).collect(),
            use_trampoline: true,
            instance: Rc::new(LoopbackInstance::new(name, Rc::new(Silent))),
        }
    }

    #[test]
    fn exposed_paths_put_own_name_last() {
        let descriptor = ExtensionDescriptor::from_host(host_extension(
            "tizen.contact",
            &["tizen.AddressBook", "tizen.Person"],
        ))
        .expect("valid descriptor");

        let paths: Vec<String> = descriptor
            .exposed_paths()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(paths, vec!["tizen.AddressBook", "tizen.Person", "tizen.contact"]);
        assert_eq!(descriptor.state(), LoadState::Unloaded);
        assert!(!descriptor.is_loaded());
    }

    #[test]
    fn rejects_invalid_entry_point() {
        let err = ExtensionDescriptor::from_host(host_extension("tizen.contact", &["tizen."]))
            .expect_err("empty segment");
        assert!(matches!(err, DescriptorError::InvalidEntryPoint { .. }));
    }

    #[test]
    fn state_machine_only_moves_forward() {
        assert!(LoadState::Unloaded.can_transition_to(LoadState::Trampolined));
        assert!(LoadState::Trampolined.can_transition_to(LoadState::Activating));
        assert!(LoadState::Activating.can_transition_to(LoadState::Abandoned));
        assert!(!LoadState::Loaded.can_transition_to(LoadState::Unloaded));
        assert!(!LoadState::Abandoned.can_transition_to(LoadState::Activating));
        assert!(!LoadState::Trampolined.can_transition_to(LoadState::Trampolined));
        assert!(LoadState::Activating.is_loaded());
        assert!(!LoadState::Trampolined.is_loaded());
    }
}
