//! Manifest-backed user module.

use super::manifest::UserModuleManifest;
use super::{BootContext, CommandModule, ModuleError};
use crate::parser::CommandError;
use clap::{Arg, ArgAction};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

const FORWARDED_ARGS: &str = "args";
/// Directory of the manifest, exported to the child process.
pub const MODULE_DIR_ENV: &str = "TOOLK_MODULE_DIR";

/// User module that runs an external program as one subcommand.
#[derive(Debug, Clone)]
pub struct UserModule {
    name: String,
    manifest_path: PathBuf,
    manifest: UserModuleManifest,
}

impl UserModule {
    pub fn new(
        name: impl Into<String>,
        manifest_path: impl Into<PathBuf>,
        manifest: UserModuleManifest,
    ) -> Self {
        Self {
            name: name.into(),
            manifest_path: manifest_path.into(),
            manifest,
        }
    }

    /// Reads the manifest at `manifest_path`.
    pub fn load(name: &str, manifest_path: &Path) -> Result<Self, ModuleError> {
        let manifest = UserModuleManifest::read(manifest_path)?;
        Ok(Self::new(name, manifest_path, manifest))
    }

    fn manifest_dir(&self) -> PathBuf {
        self.manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

impl CommandModule for UserModule {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        let module_dir = self.manifest_dir();
        let program = self.manifest.resolve_program(&module_dir);
        let prefix = self.manifest.args.clone();

        let command = clap::Command::new(self.name.clone())
            .about(self.manifest.description_or_default(&self.name))
            .disable_help_flag(true)
            .arg(
                Arg::new(FORWARDED_ARGS)
                    .action(ArgAction::Append)
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true),
            );

        ctx.add_command(command, move |matches, _| {
            let forwarded: Vec<&String> = matches
                .get_many::<String>(FORWARDED_ARGS)
                .map(|values| values.collect())
                .unwrap_or_default();
            debug!(
                "event=user_command_run module=user status=start program={} args={}",
                program.display(),
                prefix.len() + forwarded.len()
            );

            let status = Command::new(&program)
                .args(&prefix)
                .args(forwarded)
                .env(MODULE_DIR_ENV, &module_dir)
                .status()
                .map_err(|err| {
                    CommandError::Failed(format!("failed to run `{}`: {err}", program.display()))
                })?;
            if status.success() {
                Ok(())
            } else {
                Err(CommandError::ExitStatus {
                    program: program.display().to_string(),
                    code: status.code(),
                })
            }
        })
    }
}
