//! Loader configuration.
//!
//! Read from a JSON document. Every field is optional; missing fields take
//! the defaults below.

use crate::extension::manifest::DEFAULT_EXTENSION_DIR;
use crate::host::variables::{RuntimeVariables, APP_ID_KEY, RUNTIME_NAME_KEY};
use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Runtime name reported to extensions.
pub const DEFAULT_RUNTIME_NAME: &str = "wrt-service";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub runtime_name: String,
    pub app_id: Option<String>,
    /// Directory of extension libraries; relative `lib` entries resolve here.
    pub extension_dir: PathBuf,
    /// Directory scanned for plugin metadata. Defaults to `extension_dir`.
    pub metadata_dir: Option<PathBuf>,
    pub log: LoggingConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            runtime_name: DEFAULT_RUNTIME_NAME.to_string(),
            app_id: None,
            extension_dir: PathBuf::from(DEFAULT_EXTENSION_DIR),
            metadata_dir: None,
            log: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files. `None` keeps file logging off.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

impl LoaderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn metadata_dir(&self) -> &Path {
        self.metadata_dir
            .as_deref()
            .unwrap_or(self.extension_dir.as_path())
    }

    /// Variables passed to the host at startup.
    pub fn runtime_variables(&self) -> RuntimeVariables {
        let mut variables = RuntimeVariables::new().with(RUNTIME_NAME_KEY, self.runtime_name.as_str());
        if let Some(app_id) = &self.app_id {
            variables.insert(APP_ID_KEY, app_id.as_str());
        }
        variables
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}
