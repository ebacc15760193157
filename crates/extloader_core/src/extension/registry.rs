//! In-process registry of host-enumerated extensions.

use crate::extension::descriptor::{ExtensionDescriptor, LoadState};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Descriptors keyed by name, plus the order the host enumerated them in.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    entries: BTreeMap<String, ExtensionDescriptor>,
    order: Vec<String>,
    symbol_index: BTreeMap<String, String>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one descriptor. Its name and entry points must not be
    /// claimed by an earlier registration.
    pub fn register(&mut self, descriptor: ExtensionDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name().to_string();
        if let Some(owner) = self.owner_of(&name) {
            return Err(RegistryError::DuplicateName {
                owner: owner.to_string(),
                name,
            });
        }
        for entry_point in descriptor.entry_points() {
            if let Some(owner) = self.owner_of(entry_point.as_str()) {
                return Err(RegistryError::DuplicateEntryPoint {
                    entry_point: entry_point.to_string(),
                    owner: owner.to_string(),
                });
            }
        }

        for entry_point in descriptor.entry_points() {
            self.symbol_index
                .insert(entry_point.to_string(), name.clone());
        }
        self.symbol_index.insert(name.clone(), name.clone());
        self.order.push(name.clone());
        self.entries.insert(name, descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionDescriptor> {
        self.entries.get(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Extension that claimed `symbol` as its name or an entry point.
    pub fn owner_of(&self, symbol: &str) -> Option<&str> {
        self.symbol_index.get(symbol).map(String::as_str)
    }

    pub fn state(&self, name: &str) -> Option<LoadState> {
        self.entries.get(name).map(ExtensionDescriptor::state)
    }

    /// Moves `name` to `next`, returning the previous state.
    pub fn set_state(&mut self, name: &str, next: LoadState) -> Result<LoadState, RegistryError> {
        let descriptor = self
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownExtension(name.to_string()))?;
        let previous = descriptor.state();
        if !previous.can_transition_to(next) {
            return Err(RegistryError::InvalidTransition {
                name: name.to_string(),
                from: previous,
                to: next,
            });
        }
        descriptor.set_state(next);
        Ok(previous)
    }
}

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateName { name: String, owner: String },
    DuplicateEntryPoint { entry_point: String, owner: String },
    UnknownExtension(String),
    InvalidTransition {
        name: String,
        from: LoadState,
        to: LoadState,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { name, owner } => {
                write!(f, "extension name `{name}` already registered by `{owner}`")
            }
            Self::DuplicateEntryPoint { entry_point, owner } => write!(
                f,
                "entry point `{entry_point}` already registered by `{owner}`"
            ),
            Self::UnknownExtension(name) => write!(f, "extension is not registered: {name}"),
            Self::InvalidTransition { name, from, to } => {
                write!(f, "extension `{name}` cannot move from {from} to {to}")
            }
        }
    }
}

impl Error for RegistryError {}
