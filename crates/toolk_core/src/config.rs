//! Boot configuration and filesystem locations.
//!
//! # Responsibility
//! - Resolve the per-user configuration home and the paths derived from it.
//! - Parse `boot.toml`, which selects built-in modules and carries their
//!   settings.
//!
//! # Invariants
//! - `BootConfigLoader::load` never fails: a missing, unreadable or malformed
//!   file degrades to an empty configuration.
//! - Module settings are opaque to the kernel; each module reads its own table.

use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "toolk";
const BOOT_CONFIG_FILE_NAME: &str = "boot.toml";
const USER_MODULES_DIR_NAME: &str = "modules";

/// Per-module entry of the boot configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleConfig {
    /// Omitted `enabled` means enabled.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Everything besides `enabled`, untouched.
    #[serde(flatten)]
    pub settings: toml::Table,
}

impl ModuleConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            settings: toml::Table::new(),
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self::enabled()
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Parsed `boot.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootConfig {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
}

impl BootConfig {
    /// Strict parse; callers that want degrade-to-default use
    /// [`BootConfigLoader::load`].
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Enabled built-in modules, in name order.
    pub fn enabled_modules(&self) -> impl Iterator<Item = (&str, &ModuleConfig)> {
        self.modules
            .iter()
            .filter(|(_, config)| config.enabled)
            .map(|(name, config)| (name.as_str(), config))
    }

    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.get(name)
    }

    /// Settings sub-tree of one module.
    pub fn module_settings(&self, name: &str) -> Option<&toml::Table> {
        self.modules.get(name).map(|config| &config.settings)
    }
}

/// Boot configuration errors. Only surfaced by the strict parse path.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid boot configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads the boot configuration from one resolved path.
#[derive(Debug, Clone)]
pub struct BootConfigLoader {
    path: PathBuf,
}

impl BootConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the configuration file.
    pub fn try_load(&self) -> Result<BootConfig, ConfigError> {
        let source = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        BootConfig::parse(&source)
    }

    /// Reads the configuration, or returns an empty one on any failure.
    pub fn load(&self) -> BootConfig {
        match self.try_load() {
            Ok(config) => {
                debug!(
                    "event=boot_config_load module=config status=ok path={} modules={}",
                    self.path.display(),
                    config.modules.len()
                );
                config
            }
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(
                    "event=boot_config_load module=config status=missing path={}",
                    self.path.display()
                );
                BootConfig::default()
            }
            Err(err) => {
                warn!(
                    "event=boot_config_load module=config status=fallback path={} error={}",
                    self.path.display(),
                    err
                );
                BootConfig::default()
            }
        }
    }
}

/// Filesystem locations the kernel reads at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelPaths {
    pub boot_config: PathBuf,
    pub user_modules_dir: PathBuf,
}

impl KernelPaths {
    pub fn new(boot_config: impl Into<PathBuf>, user_modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            boot_config: boot_config.into(),
            user_modules_dir: user_modules_dir.into(),
        }
    }

    /// Derives both paths from one application config directory.
    pub fn under(app_dir: impl AsRef<Path>) -> Self {
        let app_dir = app_dir.as_ref();
        Self::new(
            app_dir.join(BOOT_CONFIG_FILE_NAME),
            app_dir.join(USER_MODULES_DIR_NAME),
        )
    }

    /// Resolves paths from `XDG_CONFIG_HOME` and `HOME`.
    pub fn from_env() -> Self {
        let config_home = resolve_config_home(
            std::env::var_os("XDG_CONFIG_HOME"),
            std::env::var_os("HOME"),
        );
        Self::under(config_home.join(APP_DIR_NAME))
    }
}

/// `$XDG_CONFIG_HOME` when set and non-empty, else `$HOME/.config`.
///
/// Without `HOME` the default becomes the relative `.config`.
pub fn resolve_config_home(xdg_config_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    match xdg_config_home {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(home.unwrap_or_default()).join(".config"),
    }
}
