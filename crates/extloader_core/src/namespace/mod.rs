//! Namespace model: dotted paths, exported values and the path-keyed
//! registry that backs both the protected and the public view.

pub mod export;
pub mod path;
pub mod registry;
