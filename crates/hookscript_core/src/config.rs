//! Loader configuration.
//!
//! # Responsibility
//! - Parse the TOML file that tells the loader where scripts live, how to log,
//!   and where intercept targets sit inside the host image.
//!
//! # Invariants
//! - Every field has a default; a missing file is only an error for
//!   [`load_config`].
//! - Unknown keys are rejected so typos do not silently fall back.

use crate::logging::{default_log_level, normalize_level};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "nativePC/plugins/hookscript.toml";
pub const DEFAULT_SCRIPT_DIR: &str = "nativePC/plugins/scripts";
pub const DEFAULT_LOG_DIR: &str = "nativePC/plugins/logs";
pub const DEFAULT_SCRIPT_EXTENSION: &str = "rhai";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    /// Directory scanned for extension scripts, relative to the working directory.
    pub script_dir: PathBuf,
    pub script_extension: String,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// Intercept point name to image-relative offset.
    pub targets: BTreeMap<String, u64>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            script_dir: PathBuf::from(DEFAULT_SCRIPT_DIR),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            targets: BTreeMap::new(),
        }
    }
}

impl HookConfig {
    /// Absolute log directory, resolving relative paths against `base`.
    pub fn resolve_log_dir(&self, base: &Path) -> PathBuf {
        match &self.log_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.join(DEFAULT_LOG_DIR),
        }
    }

    /// Offset of `name` inside the host image, when configured.
    pub fn target_offset(&self, name: &str) -> Option<u64> {
        self.targets.get(name).copied()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.script_extension.trim().trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid(
                "script_extension cannot be empty".to_string(),
            ));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if let Some(name) = self.targets.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "target name `{name}` cannot be blank"
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "failed to parse config `{}`: {message}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parses and validates config text. `origin` is only used in error messages.
pub fn parse_config(text: &str, origin: &Path) -> Result<HookConfig, ConfigError> {
    let config: HookConfig = toml::from_str(text).map_err(|err| ConfigError::Parse {
        path: origin.to_path_buf(),
        message: err.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<HookConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text, path)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<HookConfig, ConfigError> {
    if !path.exists() {
        return Ok(HookConfig::default());
    }
    load_config(path)
}
