//! User module manifest declaration and validation.
//!
//! A user module contributes one subcommand that runs an external program:
//!
//! ```toml
//! description = "Say hello"
//! exec = "./hello.sh"
//! args = ["--greeting", "hi"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Declarative user module manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserModuleManifest {
    /// One-line help text. Defaults to a generic description when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Program to run. Values containing a path separator are relative to
    /// the manifest directory; bare names are looked up on `PATH`.
    pub exec: String,
    /// Arguments placed before the user's own arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl UserModuleManifest {
    /// Parses and validates one manifest document.
    pub fn parse(source: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(source)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads and parses a manifest file.
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Renders the manifest as a TOML document.
    pub fn to_toml_string(&self) -> Result<String, ManifestError> {
        self.validate()?;
        Ok(toml::to_string(self)?)
    }

    /// Validates declaration-level manifest invariants.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.exec.trim().is_empty() {
            return Err(ManifestError::EmptyExec);
        }
        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err(ManifestError::EmptyDescription);
            }
        }
        Ok(())
    }

    pub fn description_or_default(&self, module_name: &str) -> String {
        match &self.description {
            Some(description) => description.trim().to_string(),
            None => format!("User module `{module_name}`"),
        }
    }

    /// Resolves `exec` against the directory holding the manifest.
    pub fn resolve_program(&self, manifest_dir: &Path) -> PathBuf {
        let exec = self.exec.trim();
        if exec.contains(std::path::MAIN_SEPARATOR) || exec.contains('/') {
            manifest_dir.join(exec)
        } else {
            PathBuf::from(exec)
        }
    }
}

/// Manifest read/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render manifest: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("manifest `exec` must not be empty")]
    EmptyExec,
    #[error("manifest `description` must not be blank")]
    EmptyDescription,
}
