//! Per-module load step with failure isolation.
//!
//! # Invariants
//! - Every attempt leaves its registry entry `Loaded` or `Failed`, never
//!   `Pending`.
//! - A failed or panicking module leaves the parser exactly as it was before
//!   the attempt.
//! - Nothing is propagated past this boundary; callers get a `bool`.

use super::registry::{builtin_module_path, ModuleOrigin, ModuleRegistry, ModuleState};
use crate::config::{BootConfig, ModuleConfig};
use crate::logging::panic_payload_message;
use crate::module::{BootContext, BuiltinCatalog, CommandModule, ModuleError, UserModule};
use crate::parser::CommandParser;
use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Mutable boot state a load attempt writes to.
pub struct LoadTarget<'a> {
    pub registry: &'a mut ModuleRegistry,
    pub parser: &'a mut CommandParser,
    pub config: &'a BootConfig,
}

/// Loads built-in modules from a catalog and user modules from manifests.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    catalog: BuiltinCatalog,
}

impl ModuleLoader {
    pub fn new(catalog: BuiltinCatalog) -> Self {
        Self { catalog }
    }

    /// Registers one built-in module.
    ///
    /// Already-loaded names are skipped and reported as success.
    pub fn register_builtin(
        &self,
        target: &mut LoadTarget<'_>,
        name: &str,
        config: ModuleConfig,
    ) -> bool {
        if target.registry.get(name).is_some_and(ModuleState::loaded) {
            debug!(
                "event=module_load module=kernel status=skipped origin=builtin name={} reason=already_loaded",
                name
            );
            return true;
        }

        let path = builtin_module_path(name);
        target.registry.upsert(ModuleState::pending(
            name,
            path.clone(),
            ModuleOrigin::Builtin,
            config,
        ));

        let outcome = match self.catalog.instantiate(name) {
            Some(module) => {
                run_registration(module.as_ref(), name, &mut *target.parser, target.config)
            }
            None => Err(ModuleError::NotFound(path.display().to_string())),
        };
        settle(target.registry, name, ModuleOrigin::Builtin, &path, outcome)
    }

    /// Registers one user module from its manifest path.
    ///
    /// The caller checks for name conflicts first.
    pub fn register_user(&self, target: &mut LoadTarget<'_>, name: &str, path: &Path) -> bool {
        target.registry.upsert(ModuleState::pending(
            name,
            path,
            ModuleOrigin::User,
            ModuleConfig::enabled(),
        ));

        let outcome = UserModule::load(name, path)
            .and_then(|module| run_registration(&module, name, &mut *target.parser, target.config));
        settle(target.registry, name, ModuleOrigin::User, path, outcome)
    }
}

/// Runs `module.register` with panic capture and parser rollback.
pub(crate) fn run_registration(
    module: &dyn CommandModule,
    name: &str,
    parser: &mut CommandParser,
    config: &BootConfig,
) -> Result<(), ModuleError> {
    let checkpoint = parser.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut ctx = BootContext::new(name, &mut *parser, config);
        module.register(&mut ctx)
    }))
    .unwrap_or_else(|payload| Err(ModuleError::Panicked(panic_payload_message(payload.as_ref()))));

    if result.is_err() {
        *parser = checkpoint;
    }
    result
}

fn settle(
    registry: &mut ModuleRegistry,
    name: &str,
    origin: ModuleOrigin,
    path: &Path,
    outcome: Result<(), ModuleError>,
) -> bool {
    match outcome {
        Ok(()) => {
            registry.mark_loaded(name);
            info!(
                "event=module_load module=kernel status=ok origin={} name={} path={}",
                origin,
                name,
                path.display()
            );
            true
        }
        Err(err) => {
            let message = err.to_string();
            error!(
                "event=module_load module=kernel status=error origin={} name={} path={} error={}",
                origin,
                name,
                path.display(),
                message
            );
            registry.mark_failed(name, message);
            false
        }
    }
}
