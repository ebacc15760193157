//! Extension modules and the trusted module catalog.
//!
//! # Responsibility
//! - Define the plugin interface: a module receives its [`Bridge`] and
//!   returns the exports it publishes.
//! - Resolve module keys against a catalog populated by the embedder.
//! - Contain module failures (returned errors and panics) so they can be
//!   reported per extension.

use crate::bridge::Bridge;
use crate::logging::payload_message;
use crate::namespace::export::{Export, ExportsTable, ThrownError};
use crate::namespace::path::PathError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// What a module publishes when evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleExports {
    /// Installed at the extension's own name.
    pub exports: ExportsTable,
    /// Values for declared entry points, installed at their own paths.
    pub entry_points: Vec<(String, Export)>,
}

impl ModuleExports {
    pub fn new(exports: ExportsTable) -> Self {
        Self {
            exports,
            entry_points: Vec::new(),
        }
    }

    pub fn with_entry_point(mut self, path: impl Into<String>, export: Export) -> Self {
        self.entry_points.push((path.into(), export));
        self
    }
}

/// Extension code.
pub trait ExtensionModule {
    fn evaluate(&self, bridge: &Bridge) -> Result<ModuleExports, ThrownError>;
}

impl<F> ExtensionModule for F
where
    F: Fn(&Bridge) -> Result<ModuleExports, ThrownError>,
{
    fn evaluate(&self, bridge: &Bridge) -> Result<ModuleExports, ThrownError> {
        self(bridge)
    }
}

/// Evaluates `module`, turning a panic into [`ModuleError::Panicked`].
pub fn evaluate_module(
    module: &dyn ExtensionModule,
    bridge: &Bridge,
) -> Result<ModuleExports, ModuleError> {
    match catch_unwind(AssertUnwindSafe(|| module.evaluate(bridge))) {
        Ok(Ok(exports)) => Ok(exports),
        Ok(Err(thrown)) => Err(ModuleError::Thrown(thrown)),
        Err(payload) => Err(ModuleError::Panicked(payload_message(payload.as_ref()))),
    }
}

/// Trusted modules keyed by the code key the host reports.
#[derive(Default)]
pub struct ModuleCatalog {
    modules: BTreeMap<String, Rc<dyn ExtensionModule>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under `key`, replacing any earlier module.
    pub fn register(&mut self, key: impl Into<String>, module: impl ExtensionModule + 'static) {
        self.modules.insert(key.into(), Rc::new(module));
    }

    pub fn with(mut self, key: impl Into<String>, module: impl ExtensionModule + 'static) -> Self {
        self.register(key, module);
        self
    }

    pub fn get(&self, key: &str) -> Option<Rc<dyn ExtensionModule>> {
        self.modules.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.modules.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Debug for ModuleCatalog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("keys", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Module evaluation failures. All of them abandon the extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    UnknownModule(String),
    Thrown(ThrownError),
    Panicked(String),
    InvalidEntryPoint { value: String, source: PathError },
    UndeclaredEntryPoint(String),
}

impl Display for ModuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModule(key) => write!(f, "no module registered for `{key}`"),
            Self::Thrown(err) => write!(f, "{err}"),
            Self::Panicked(message) => write!(f, "module panicked: {message}"),
            Self::InvalidEntryPoint { value, source } => {
                write!(f, "exported entry point `{value}` is invalid: {source}")
            }
            Self::UndeclaredEntryPoint(value) => {
                write!(f, "exported entry point `{value}` was not declared")
            }
        }
    }
}

impl Error for ModuleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Thrown(err) => Some(err),
            Self::InvalidEntryPoint { source, .. } => Some(source),
            _ => None,
        }
    }
}
