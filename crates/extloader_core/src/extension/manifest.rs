//! Plugin metadata manifests and symbol registration.
//!
//! # Responsibility
//! - Parse plugin metadata files (`[{name, lib, entry_points}]`).
//! - Register manifests while rejecting names and entry points that are
//!   already claimed.
//! - Compute which extensions are activated eagerly at startup.
//!
//! # Invariants
//! - A symbol (extension name or entry point) belongs to at most one
//!   registered manifest.
//! - Metadata files in a directory are read in sorted path order.

use crate::namespace::path::{NamespacePath, PathError};
use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Directory holding extension libraries and their metadata files.
pub const DEFAULT_EXTENSION_DIR: &str = "/usr/lib/tizen-extensions-crosswalk";
const METADATA_EXTENSION: &str = "json";

/// One extension declared by plugin metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionManifest {
    /// Dotted namespace name, e.g. `tizen.contact`.
    pub name: String,
    /// Absolute path of the extension library.
    pub lib: PathBuf,
    /// Extra namespace paths the extension populates, in declaration order.
    pub entry_points: Vec<String>,
    /// Defer activation to first access. Recomputed by
    /// [`ManifestSet::apply_trampoline_flags`].
    pub use_trampoline: bool,
}

impl ExtensionManifest {
    pub fn new(name: impl Into<String>, lib: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            lib: lib.into(),
            entry_points: Vec::new(),
            use_trampoline: true,
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_points.push(entry_point.into());
        self
    }

    /// Validates declaration-level manifest invariants.
    pub fn validate(&self) -> Result<(), ManifestValidationError> {
        if self.name.trim().is_empty() {
            return Err(ManifestValidationError::EmptyName);
        }
        NamespacePath::parse(&self.name).map_err(|source| ManifestValidationError::InvalidName {
            value: self.name.clone(),
            source,
        })?;

        if self.lib.as_os_str().is_empty() {
            return Err(ManifestValidationError::EmptyLib);
        }

        let mut dedup = BTreeSet::new();
        dedup.insert(self.name.trim());
        for entry_point in &self.entry_points {
            NamespacePath::parse(entry_point).map_err(|source| {
                ManifestValidationError::InvalidEntryPoint {
                    value: entry_point.clone(),
                    source,
                }
            })?;
            if !dedup.insert(entry_point.trim()) {
                return Err(ManifestValidationError::DuplicateEntryPoint(
                    entry_point.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Key under which the extension module is looked up: the library file
    /// name (`libcontact.so`), or the whole path when it has none.
    pub fn module_key(&self) -> String {
        self.lib
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.lib.to_string_lossy().into_owned())
    }
}

/// Parses one metadata document.
///
/// Entries that are not objects, or that lack a string `name` or `lib`, are
/// skipped. A relative `lib` is resolved against `extension_dir`.
pub fn parse_metadata(
    json: &str,
    extension_dir: &Path,
) -> Result<Vec<ExtensionManifest>, MetadataError> {
    let document: Value = serde_json::from_str(json).map_err(MetadataError::Json)?;
    let Value::Array(plugins) = document else {
        return Err(MetadataError::NotAnArray);
    };

    let mut manifests = Vec::with_capacity(plugins.len());
    for plugin in &plugins {
        let Value::Object(fields) = plugin else {
            continue;
        };
        let name = fields.get("name").and_then(Value::as_str);
        let lib = fields.get("lib").and_then(Value::as_str);
        let (Some(name), Some(lib)) = (name, lib) else {
            warn!("event=metadata_parse module=extension status=skipped reason=missing_name_or_lib");
            continue;
        };
        if lib.is_empty() {
            warn!(
                "event=metadata_parse module=extension status=skipped reason=empty_lib name={}",
                name
            );
            continue;
        }

        let lib_path = Path::new(lib);
        let lib = if lib_path.is_absolute() {
            lib_path.to_path_buf()
        } else {
            extension_dir.join(lib_path)
        };

        let entry_points = match fields.get("entry_points") {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|value| match value {
                    Value::String(entry) => Some(entry.clone()),
                    other => {
                        warn!(
                            "event=metadata_parse module=extension status=skipped reason=non_string_entry_point name={} value={}",
                            name, other
                        );
                        None
                    }
                })
                .collect(),
            _ => {
                warn!(
                    "event=metadata_parse module=extension status=degraded reason=no_entry_points name={}",
                    name
                );
                Vec::new()
            }
        };

        manifests.push(ExtensionManifest {
            name: name.to_string(),
            lib,
            entry_points,
            use_trampoline: true,
        });
    }
    Ok(manifests)
}

/// Reads and parses one metadata file.
pub fn load_metadata_file(
    path: &Path,
    extension_dir: &Path,
) -> Result<Vec<ExtensionManifest>, MetadataError> {
    let json = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_metadata(&json, extension_dir)
}

/// Reads every `*.json` metadata file in `metadata_dir`, in sorted order.
///
/// Files that cannot be read or parsed are logged and skipped; only a failure
/// to list the directory is an error.
pub fn load_metadata_dir(
    metadata_dir: &Path,
    extension_dir: &Path,
) -> Result<Vec<ExtensionManifest>, MetadataError> {
    let listing = std::fs::read_dir(metadata_dir).map_err(|source| MetadataError::Io {
        path: metadata_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for item in listing {
        let item = item.map_err(|source| MetadataError::Io {
            path: metadata_dir.to_path_buf(),
            source,
        })?;
        let path = item.path();
        let is_metadata = path.is_file()
            && path
                .extension()
                .is_some_and(|extension| extension == METADATA_EXTENSION);
        if is_metadata {
            files.push(path);
        }
    }
    files.sort();

    let mut manifests = Vec::new();
    for file in &files {
        match load_metadata_file(file, extension_dir) {
            Ok(mut parsed) => {
                debug!(
                    "event=metadata_load module=extension status=ok file={} count={}",
                    file.display(),
                    parsed.len()
                );
                manifests.append(&mut parsed);
            }
            Err(err) => warn!(
                "event=metadata_load module=extension status=skipped file={} error={}",
                file.display(),
                err
            ),
        }
    }
    Ok(manifests)
}

/// Registered manifests keyed by extension name.
#[derive(Debug, Default)]
pub struct ManifestSet {
    manifests: BTreeMap<String, ExtensionManifest>,
    symbols: BTreeSet<String>,
}

impl ManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one manifest after validation and symbol checks.
    pub fn register(&mut self, manifest: ExtensionManifest) -> Result<(), RegistrationError> {
        manifest.validate().map_err(RegistrationError::Invalid)?;
        if self.symbols.contains(manifest.name.as_str()) {
            return Err(RegistrationError::DuplicateName(manifest.name));
        }
        if let Some(taken) = manifest
            .entry_points
            .iter()
            .find(|entry_point| self.symbols.contains(entry_point.as_str()))
        {
            return Err(RegistrationError::DuplicateEntryPoint(taken.clone()));
        }

        self.symbols.extend(manifest.entry_points.iter().cloned());
        self.symbols.insert(manifest.name.clone());
        self.manifests.insert(manifest.name.clone(), manifest);
        Ok(())
    }

    /// Registers every manifest in order, logging and skipping rejected ones.
    /// Returns the number registered.
    pub fn register_all(&mut self, manifests: impl IntoIterator<Item = ExtensionManifest>) -> usize {
        let mut registered = 0;
        for manifest in manifests {
            let name = manifest.name.clone();
            match self.register(manifest) {
                Ok(()) => registered += 1,
                Err(err) => warn!(
                    "event=extension_register module=extension status=skipped name={} error={}",
                    name, err
                ),
            }
        }
        registered
    }

    /// Marks the shallowest registered prefix-or-self of every extension name
    /// as eager. Everything else is trampolined.
    pub fn apply_trampoline_flags(&mut self) {
        let mut eager = BTreeSet::new();
        for name in self.manifests.keys() {
            let mut prefix = String::new();
            for segment in name.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);
                if self.manifests.contains_key(prefix.as_str()) {
                    eager.insert(prefix.clone());
                    break;
                }
            }
        }
        for (name, manifest) in &mut self.manifests {
            manifest.use_trampoline = !eager.contains(name.as_str());
        }
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionManifest> {
        self.manifests.get(name)
    }

    /// Manifests in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionManifest> {
        self.manifests.values()
    }

    pub fn into_manifests(self) -> Vec<ExtensionManifest> {
        self.manifests.into_values().collect()
    }
}

/// Manifest declaration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidationError {
    EmptyName,
    InvalidName { value: String, source: PathError },
    EmptyLib,
    InvalidEntryPoint { value: String, source: PathError },
    DuplicateEntryPoint(String),
}

impl Display for ManifestValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "manifest name must not be empty"),
            Self::InvalidName { value, source } => {
                write!(f, "manifest name is invalid: {value} ({source})")
            }
            Self::EmptyLib => write!(f, "manifest lib must not be empty"),
            Self::InvalidEntryPoint { value, source } => {
                write!(f, "manifest entry point is invalid: {value} ({source})")
            }
            Self::DuplicateEntryPoint(value) => {
                write!(f, "manifest entry point is duplicated: {value}")
            }
        }
    }
}

impl Error for ManifestValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName { source, .. } | Self::InvalidEntryPoint { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Symbol registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    Invalid(ManifestValidationError),
    DuplicateName(String),
    DuplicateEntryPoint(String),
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "invalid extension manifest: {err}"),
            Self::DuplicateName(name) => {
                write!(f, "extension name already registered: {name}")
            }
            Self::DuplicateEntryPoint(entry_point) => {
                write!(f, "extension entry point already registered: {entry_point}")
            }
        }
    }
}

impl Error for RegistrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

/// Metadata loading errors.
#[derive(Debug)]
pub enum MetadataError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    NotAnArray,
}

impl Display for MetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read plugin metadata `{}`: {source}", path.display())
            }
            Self::Json(err) => write!(f, "plugin metadata is not valid JSON: {err}"),
            Self::NotAnArray => write!(f, "plugin metadata must be a JSON array"),
        }
    }
}

impl Error for MetadataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::NotAnArray => None,
        }
    }
}
