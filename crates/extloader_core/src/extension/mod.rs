//! Extension contracts.
//!
//! Descriptors and their load state, the registry the loader keeps them in,
//! the module plugin interface, and plugin metadata manifests.

pub mod descriptor;
pub mod manifest;
pub mod module;
pub mod registry;
