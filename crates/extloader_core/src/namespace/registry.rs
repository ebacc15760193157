//! Path-keyed namespace registry.
//!
//! # Responsibility
//! - Hold every namespace binding in one map keyed by dotted path.
//! - Give each path a protected facet (authoritative values) and a public
//!   facet (what the hosted application can see).
//! - Provide the structural operations the activator and trampoline installer
//!   build on: container creation, assignment, lazy bindings, promotion.
//!
//! # Invariants
//! - Every strict prefix of a bound path is container-like in the same view
//!   (a `Container` or an `Export::Namespace`), unless creation was stopped by
//!   a leaf value that was already there.
//! - Existing values are never replaced by `create_namespace`.
//! - `PublicBinding::Forward` can be neither reassigned nor removed.
//! - Lookups never trigger activation; a lazy binding is reported as
//!   `Lookup::Pending` and left to the caller.

use crate::namespace::export::Export;
use crate::namespace::path::NamespacePath;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Which face of the registry an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Protected,
    Public,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protected => "protected",
            Self::Public => "public",
        }
    }
}

/// Binding in the protected view.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Container,
    Value(Export),
}

/// Binding in the public view.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicBinding {
    /// Plain container created by the namespace builder.
    Container,
    /// Plain writable value.
    Value(Export),
    /// Lazy accessor owned by the named extension. Enumerable and
    /// configurable: it may be removed or replaced.
    Trampoline(String),
    /// Read-only, non-configurable accessor returning the protected slot at
    /// the same path.
    Forward,
}

#[derive(Debug, Clone, Default)]
struct NamespaceEntry {
    protected: Option<Slot>,
    public: Option<PublicBinding>,
}

impl NamespaceEntry {
    fn is_vacant(&self) -> bool {
        self.protected.is_none() && self.public.is_none()
    }
}

/// Result of a non-triggering lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Missing,
    Container,
    Value(Export),
    /// The walk met a lazy binding at `at` before reaching the requested path.
    Pending {
        extension: String,
        at: NamespacePath,
    },
}

enum Cursor<'a> {
    Missing,
    Container,
    Value(&'a Export),
    Pending {
        extension: &'a str,
        at: &'a NamespacePath,
    },
}

impl<'a> Cursor<'a> {
    fn from_slot(slot: &'a Slot) -> Self {
        match slot {
            Slot::Container => Self::Container,
            Slot::Value(export) => Self::Value(export),
        }
    }
}

/// Namespace registry shared by the loader components.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    entries: BTreeMap<NamespacePath, NamespaceEntry>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty container at every prefix of `path` that has no
    /// binding yet.
    ///
    /// Idempotent. Values already installed are kept; creation stops silently
    /// when an intermediate segment holds a non-container value.
    pub fn create_namespace(&mut self, view: View, path: &NamespacePath) {
        if let Err(blocked_at) = self.ensure_containers(view, path) {
            debug!(
                "event=namespace_create module=namespace status=blocked view={} path={} blocked_at={}",
                view.as_str(),
                path,
                blocked_at
            );
        }
    }

    /// Installs `export` at `path`, creating missing parent containers.
    pub fn assign(
        &mut self,
        view: View,
        path: &NamespacePath,
        export: Export,
    ) -> Result<(), NamespaceError> {
        self.check_assign(view, path)?;
        if let Some(parent) = path.parent() {
            self.ensure_containers(view, &parent)
                .map_err(NamespaceError::NotAContainer)?;
        }
        let entry = self.entries.entry(path.clone()).or_default();
        match view {
            View::Protected => entry.protected = Some(Slot::Value(export)),
            View::Public => entry.public = Some(PublicBinding::Value(export)),
        }
        Ok(())
    }

    /// Reports whether [`NamespaceRegistry::assign`] at `path` would succeed,
    /// without changing anything.
    pub fn check_assign(&self, view: View, path: &NamespacePath) -> Result<(), NamespaceError> {
        if let Some(parent) = path.parent() {
            for prefix in parent.ancestors_and_self() {
                if let Cursor::Value(export) = self.cursor(view, &prefix) {
                    if !export.is_container() {
                        return Err(NamespaceError::NotAContainer(prefix));
                    }
                }
            }
        }
        if view == View::Public
            && matches!(
                self.public_binding(path),
                Some(PublicBinding::Forward) | Some(PublicBinding::Trampoline(_))
            )
        {
            return Err(NamespaceError::ReadOnly(path.clone()));
        }
        Ok(())
    }

    /// Replaces the public binding at `path` with a lazy accessor owned by
    /// `extension`.
    pub fn install_trampoline(
        &mut self,
        path: &NamespacePath,
        extension: &str,
    ) -> Result<(), NamespaceError> {
        self.ensure_containers(View::Public, path)
            .map_err(NamespaceError::NotAContainer)?;
        let entry = self.entries.entry(path.clone()).or_default();
        if matches!(entry.public, Some(PublicBinding::Forward)) {
            return Err(NamespaceError::NotConfigurable(path.clone()));
        }
        entry.public = Some(PublicBinding::Trampoline(extension.to_string()));
        Ok(())
    }

    /// Deletes the public binding at `path`, returning what was there.
    pub fn remove_public(
        &mut self,
        path: &NamespacePath,
    ) -> Result<Option<PublicBinding>, NamespaceError> {
        let Some(entry) = self.entries.get_mut(path.as_str()) else {
            return Ok(None);
        };
        if matches!(entry.public, Some(PublicBinding::Forward)) {
            return Err(NamespaceError::NotConfigurable(path.clone()));
        }
        let removed = entry.public.take();
        if entry.is_vacant() {
            self.entries.remove(path.as_str());
        }
        Ok(removed)
    }

    /// Moves the public value at `path` into the protected view and leaves a
    /// read-only forwarding accessor behind.
    ///
    /// A public container does not replace a protected value that is already
    /// there; a missing public value leaves the protected slot untouched.
    pub fn promote(&mut self, path: &NamespacePath) -> Result<(), NamespaceError> {
        if let Some(parent) = path.parent() {
            self.ensure_containers(View::Protected, &parent)
                .map_err(NamespaceError::NotAContainer)?;
        }
        let moved = match self.cursor(View::Public, path) {
            Cursor::Value(export) => Some(Slot::Value(export.clone())),
            Cursor::Container => Some(Slot::Container),
            Cursor::Missing | Cursor::Pending { .. } => None,
        };
        let entry = self.entries.entry(path.clone()).or_default();
        match moved {
            Some(Slot::Value(export)) => entry.protected = Some(Slot::Value(export)),
            Some(Slot::Container) if entry.protected.is_none() => {
                entry.protected = Some(Slot::Container);
            }
            _ => {}
        }
        entry.public = Some(PublicBinding::Forward);
        Ok(())
    }

    /// Resolves `path` in `view` without side effects.
    pub fn lookup(&self, view: View, path: &NamespacePath) -> Lookup {
        match self.cursor(view, path) {
            Cursor::Missing => Lookup::Missing,
            Cursor::Container => Lookup::Container,
            Cursor::Value(export) => Lookup::Value(export.clone()),
            Cursor::Pending { extension, at } => Lookup::Pending {
                extension: extension.to_string(),
                at: at.clone(),
            },
        }
    }

    /// Enumerates the direct children of `parent` (`None` for the root),
    /// including lazy bindings, without resolving anything.
    pub fn children(&self, view: View, parent: Option<&NamespacePath>) -> Vec<String> {
        let mut names = BTreeSet::new();
        for (path, entry) in &self.entries {
            let present = match view {
                View::Protected => entry.protected.is_some(),
                View::Public => entry.public.is_some(),
            };
            if present && path.parent().as_ref() == parent {
                names.insert(path.base_name().to_string());
            }
        }
        if let Some(parent) = parent {
            if let Cursor::Value(Export::Namespace(table)) = self.cursor(view, parent) {
                names.extend(table.keys().map(str::to_string));
            }
        }
        names.into_iter().collect()
    }

    pub fn public_binding(&self, path: &NamespacePath) -> Option<&PublicBinding> {
        self.entries
            .get(path.as_str())
            .and_then(|entry| entry.public.as_ref())
    }

    pub fn protected_slot(&self, path: &NamespacePath) -> Option<&Slot> {
        self.entries
            .get(path.as_str())
            .and_then(|entry| entry.protected.as_ref())
    }

    /// Paths holding a binding in `view`, in path order.
    pub fn bound_paths(&self, view: View) -> Vec<&NamespacePath> {
        self.entries
            .iter()
            .filter(|(_, entry)| match view {
                View::Protected => entry.protected.is_some(),
                View::Public => entry.public.is_some(),
            })
            .map(|(path, _)| path)
            .collect()
    }

    fn ensure_containers(&mut self, view: View, path: &NamespacePath) -> Result<(), NamespacePath> {
        for prefix in path.ancestors_and_self() {
            let is_leaf = prefix == *path;
            match self.cursor(view, &prefix) {
                Cursor::Missing => self.set_container(view, &prefix),
                Cursor::Container | Cursor::Pending { .. } => {}
                Cursor::Value(export) => {
                    if !export.is_container() && !is_leaf {
                        return Err(prefix);
                    }
                }
            }
        }
        Ok(())
    }

    fn set_container(&mut self, view: View, path: &NamespacePath) {
        let entry = self.entries.entry(path.clone()).or_default();
        match view {
            View::Protected if entry.protected.is_none() => {
                entry.protected = Some(Slot::Container);
            }
            View::Public if entry.public.is_none() => {
                entry.public = Some(PublicBinding::Container);
            }
            _ => {}
        }
    }

    fn cursor(&self, view: View, path: &NamespacePath) -> Cursor<'_> {
        let mut current = Cursor::Container;
        for prefix in path.ancestors_and_self() {
            let keyed = match self.entries.get_key_value(prefix.as_str()) {
                None => None,
                Some((key, entry)) => match view {
                    View::Protected => entry.protected.as_ref().map(Cursor::from_slot),
                    View::Public => match &entry.public {
                        None => None,
                        Some(PublicBinding::Container) => Some(Cursor::Container),
                        Some(PublicBinding::Value(export)) => Some(Cursor::Value(export)),
                        Some(PublicBinding::Trampoline(extension)) => {
                            return Cursor::Pending { extension, at: key };
                        }
                        Some(PublicBinding::Forward) => Some(
                            entry
                                .protected
                                .as_ref()
                                .map(Cursor::from_slot)
                                .unwrap_or(Cursor::Missing),
                        ),
                    },
                },
            };
            current = match keyed {
                Some(cursor) => cursor,
                None => match current {
                    Cursor::Value(Export::Namespace(table)) => table
                        .get(prefix.base_name())
                        .map(Cursor::Value)
                        .unwrap_or(Cursor::Missing),
                    _ => Cursor::Missing,
                },
            };
        }
        current
    }
}

/// Namespace mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// The public binding is an accessor without a setter.
    ReadOnly(NamespacePath),
    /// The public binding is a non-configurable accessor.
    NotConfigurable(NamespacePath),
    /// An intermediate segment holds a leaf value.
    NotAContainer(NamespacePath),
}

impl Display for NamespaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly(path) => write!(f, "namespace path is read-only: {path}"),
            Self::NotConfigurable(path) => {
                write!(f, "namespace path cannot be redefined or deleted: {path}")
            }
            Self::NotAContainer(path) => {
                write!(f, "namespace path holds a value, not a container: {path}")
            }
        }
    }
}

impl Error for NamespaceError {}

#[cfg(test)]
mod tests {
    use super::{Lookup, NamespaceError, NamespaceRegistry, PublicBinding, Slot, View};
    use crate::namespace::export::{Export, ExportsTable};
    use crate::namespace::path::NamespacePath;
    use serde_json::json;

    fn path(value: &str) -> NamespacePath {
        NamespacePath::parse(value).expect("valid test path")
    }

    #[test]
    fn create_namespace_builds_every_prefix_and_is_idempotent() {
        let mut registry = NamespaceRegistry::new();
        registry.create_namespace(View::Public, &path("tizen.contact"));
        registry.create_namespace(View::Public, &path("tizen.contact"));

        assert_eq!(
            registry.lookup(View::Public, &path("tizen")),
            Lookup::Container
        );
        assert_eq!(
            registry.lookup(View::Public, &path("tizen.contact")),
            Lookup::Container
        );
        assert_eq!(
            registry.lookup(View::Protected, &path("tizen")),
            Lookup::Missing
        );
        assert_eq!(registry.bound_paths(View::Public).len(), 2);
    }

    #[test]
    fn create_namespace_keeps_installed_leaf_values() {
        let mut registry = NamespaceRegistry::new();
        registry
            .assign(View::Public, &path("a.b"), Export::constant(7))
            .expect("assign");
        registry.create_namespace(View::Public, &path("a.b"));

        assert_eq!(
            registry.lookup(View::Public, &path("a.b")),
            Lookup::Value(Export::constant(7))
        );
    }

    #[test]
    fn create_namespace_stops_at_intermediate_leaf() {
        let mut registry = NamespaceRegistry::new();
        registry
            .assign(View::Public, &path("a.b"), Export::constant("leaf"))
            .expect("assign");
        registry.create_namespace(View::Public, &path("a.b.c"));

        assert_eq!(registry.lookup(View::Public, &path("a.b.c")), Lookup::Missing);
        let err = registry
            .assign(View::Public, &path("a.b.c.d"), Export::constant(1))
            .expect_err("leaf blocks assignment below it");
        assert_eq!(err, NamespaceError::NotAContainer(path("a.b")));
    }

    #[test]
    fn check_assign_reports_without_writing() {
        let mut registry = NamespaceRegistry::new();
        registry
            .assign(View::Public, &path("a.leaf"), Export::constant(1))
            .expect("assign leaf");
        registry
            .install_trampoline(&path("a.lazy"), "a.lazy")
            .expect("install trampoline");
        let before = registry.bound_paths(View::Public).len();

        assert_eq!(
            registry.check_assign(View::Public, &path("a.leaf.child")),
            Err(NamespaceError::NotAContainer(path("a.leaf")))
        );
        assert_eq!(
            registry.check_assign(View::Public, &path("a.lazy")),
            Err(NamespaceError::ReadOnly(path("a.lazy")))
        );
        assert_eq!(registry.check_assign(View::Protected, &path("a.lazy")), Ok(()));
        assert_eq!(registry.check_assign(View::Public, &path("a.fresh.value")), Ok(()));
        assert_eq!(registry.bound_paths(View::Public).len(), before);
        assert_eq!(registry.lookup(View::Public, &path("a.fresh")), Lookup::Missing);

        let err = registry
            .assign(View::Public, &path("a.leaf.child"), Export::constant(2))
            .expect_err("leaf parent");
        assert_eq!(err, NamespaceError::NotAContainer(path("a.leaf")));
    }

    #[test]
    fn overlapping_prefixes_keep_independent_leaves() {
        let mut registry = NamespaceRegistry::new();
        registry
            .assign(View::Public, &path("a.b"), Export::constant("b"))
            .expect("assign a.b");
        registry
            .assign(View::Public, &path("a.c"), Export::constant("c"))
            .expect("assign a.c");

        assert_eq!(
            registry.lookup(View::Public, &path("a.b")),
            Lookup::Value(Export::constant("b"))
        );
        assert_eq!(
            registry.lookup(View::Public, &path("a.c")),
            Lookup::Value(Export::constant("c"))
        );
        assert_eq!(
            registry.children(View::Public, Some(&path("a"))),
            vec!["b", "c"]
        );
    }

    #[test]
    fn lookup_descends_into_exported_tables() {
        let mut registry = NamespaceRegistry::new();
        let exports = ExportsTable::new().with_constant("VERSION", "2.4");
        registry
            .assign(View::Public, &path("tizen.contact"), exports.into())
            .expect("assign");

        assert_eq!(
            registry.lookup(View::Public, &path("tizen.contact.VERSION")),
            Lookup::Value(Export::constant("2.4"))
        );
        assert_eq!(
            registry.lookup(View::Public, &path("tizen.contact.missing")),
            Lookup::Missing
        );
        assert_eq!(
            registry.children(View::Public, Some(&path("tizen.contact"))),
            vec!["VERSION"]
        );
    }

    #[test]
    fn trampoline_reports_pending_without_resolving() {
        let mut registry = NamespaceRegistry::new();
        registry
            .install_trampoline(&path("tizen.contact"), "tizen.contact")
            .expect("install");

        let expected = Lookup::Pending {
            extension: "tizen.contact".to_string(),
            at: path("tizen.contact"),
        };
        assert_eq!(
            registry.lookup(View::Public, &path("tizen.contact")),
            expected
        );
        assert_eq!(
            registry.lookup(View::Public, &path("tizen.contact.find")),
            expected
        );
        assert_eq!(registry.children(View::Public, Some(&path("tizen"))), vec!["contact"]);

        let err = registry
            .assign(View::Public, &path("tizen.contact"), Export::constant(1))
            .expect_err("trampoline has no setter");
        assert!(matches!(err, NamespaceError::ReadOnly(_)));

        let removed = registry
            .remove_public(&path("tizen.contact"))
            .expect("trampoline is configurable");
        assert_eq!(
            removed,
            Some(PublicBinding::Trampoline("tizen.contact".to_string()))
        );
        assert_eq!(
            registry.lookup(View::Public, &path("tizen.contact")),
            Lookup::Missing
        );
    }

    #[test]
    fn promote_moves_value_and_locks_public_path() {
        let mut registry = NamespaceRegistry::new();
        registry.create_namespace(View::Protected, &path("tizen.contact"));
        registry
            .assign(View::Public, &path("tizen.AddressBook"), Export::constant("book"))
            .expect("assign");

        registry.promote(&path("tizen.AddressBook")).expect("promote");

        assert_eq!(
            registry.protected_slot(&path("tizen.AddressBook")),
            Some(&Slot::Value(Export::constant("book")))
        );
        assert_eq!(
            registry.public_binding(&path("tizen.AddressBook")),
            Some(&PublicBinding::Forward)
        );
        assert_eq!(
            registry.lookup(View::Public, &path("tizen.AddressBook")),
            Lookup::Value(Export::constant("book"))
        );

        let err = registry
            .assign(View::Public, &path("tizen.AddressBook"), Export::constant("x"))
            .expect_err("forward is read-only");
        assert!(matches!(err, NamespaceError::ReadOnly(_)));
        let err = registry
            .remove_public(&path("tizen.AddressBook"))
            .expect_err("forward is not configurable");
        assert!(matches!(err, NamespaceError::NotConfigurable(_)));
        let err = registry
            .install_trampoline(&path("tizen.AddressBook"), "other")
            .expect_err("forward cannot be redefined");
        assert!(matches!(err, NamespaceError::NotConfigurable(_)));
    }

    #[test]
    fn promote_keeps_protected_exports_when_public_is_a_container() {
        let mut registry = NamespaceRegistry::new();
        let exports = Export::Namespace(ExportsTable::new().with_constant("id", json!(1)));
        registry.create_namespace(View::Public, &path("tizen.contact"));
        registry
            .assign(View::Protected, &path("tizen.contact"), exports.clone())
            .expect("assign protected");

        registry.promote(&path("tizen.contact")).expect("promote");

        assert_eq!(
            registry.lookup(View::Public, &path("tizen.contact")),
            Lookup::Value(exports)
        );
    }

    #[test]
    fn promote_of_missing_value_forwards_to_nothing() {
        let mut registry = NamespaceRegistry::new();
        registry.promote(&path("tizen.AddressBook")).expect("promote");
        assert_eq!(
            registry.lookup(View::Public, &path("tizen.AddressBook")),
            Lookup::Missing
        );
        assert_eq!(
            registry.lookup(View::Protected, &path("tizen")),
            Lookup::Container
        );
    }
}
