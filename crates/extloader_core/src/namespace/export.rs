//! Values an extension module publishes into the namespace.
//!
//! # Responsibility
//! - Model an extension's public API as a table of named exports.
//! - Keep methods cheap to clone so one export can be visible from several
//!   namespace paths at once.
//!
//! # Invariants
//! - Only `Export::Namespace` is container-like; constants and methods are
//!   leaves and block namespace creation beneath them.
//! - Two methods compare equal only when they are the same closure.

use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Error raised by extension code, either while evaluating a module or from
/// inside one of its exported methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrownError {
    message: String,
}

impl ThrownError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ThrownError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ThrownError {}

type MethodFn = dyn Fn(&[Value]) -> Result<Value, ThrownError>;

/// Callable export.
#[derive(Clone)]
pub struct Method(Rc<MethodFn>);

impl Method {
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, ThrownError> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ThrownError> {
        (self.0)(args)
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Method(..)")
    }
}

/// One exported value.
#[derive(Debug, Clone, PartialEq)]
pub enum Export {
    Namespace(ExportsTable),
    Method(Method),
    Constant(Value),
}

impl Export {
    pub fn method(f: impl Fn(&[Value]) -> Result<Value, ThrownError> + 'static) -> Self {
        Self::Method(Method::new(f))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Namespace(_))
    }

    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Self::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Self::Constant(value) => Some(value),
            _ => None,
        }
    }
}

impl From<ExportsTable> for Export {
    fn from(value: ExportsTable) -> Self {
        Self::Namespace(value)
    }
}

/// Ordered table of named exports (the `exports` object of one extension).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportsTable {
    members: BTreeMap<String, Export>,
}

impl ExportsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one member, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, export: Export) -> Option<Export> {
        self.members.insert(name.into(), export)
    }

    /// Builder form of [`ExportsTable::insert`].
    pub fn with(mut self, name: impl Into<String>, export: Export) -> Self {
        self.insert(name, export);
        self
    }

    pub fn with_method(
        self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, ThrownError> + 'static,
    ) -> Self {
        self.with(name, Export::method(f))
    }

    pub fn with_constant(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(name, Export::constant(value))
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.members.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.members.iter().map(|(name, export)| (name.as_str(), export))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
