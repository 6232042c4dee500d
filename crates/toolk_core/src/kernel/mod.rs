//! Module kernel facade.
//!
//! # Responsibility
//! - Run the boot sequence: configure the parser, load the boot
//!   configuration, register enabled built-ins, discover and register user
//!   modules, then announce `modules:loaded`.
//! - Hand the command line to the shared parser once boot is complete.
//!
//! # Invariants
//! - Phases advance strictly `Uninitialized -> Configuring -> Loading ->
//!   Ready -> Running`; there is no re-entry into `Loading`.
//! - A user module whose name is already registered is refused before any
//!   load attempt and the existing entry is left untouched.
//! - Module failures never abort the boot.

pub mod discovery;
pub mod loader;
pub mod registry;

use crate::config::{BootConfig, BootConfigLoader, KernelPaths};
use crate::events::{EventBus, KernelEvent, KernelEventKind, LoadSummary};
use crate::module::{BuiltinCatalog, CommandModule, ModuleError};
use crate::parser::{CommandParser, DispatchContext, ParserError};
use discovery::discover_user_modules;
use loader::{run_registration, LoadTarget, ModuleLoader};
use log::{error, info};
use registry::{ModuleConflict, ModuleRegistry, ModuleState};
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Boot state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelPhase {
    Uninitialized,
    Configuring,
    Loading,
    Ready,
    Running,
}

impl Display for KernelPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Configuring => "configuring",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}

/// Kernel misuse and dispatch errors. Module failures are not reported here.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("kernel is {actual}; operation requires {expected}")]
    InvalidPhase {
        expected: KernelPhase,
        actual: KernelPhase,
    },
    #[error("compiled-in module `{name}` failed to register: {source}")]
    StaticModule {
        name: String,
        #[source]
        source: ModuleError,
    },
    #[error(transparent)]
    Parser(#[from] ParserError),
}

/// Owns the registry, the shared parser and the boot event bus.
pub struct Kernel {
    boot_time: Instant,
    phase: KernelPhase,
    paths: KernelPaths,
    config: BootConfig,
    registry: ModuleRegistry,
    conflicts: Vec<ModuleConflict>,
    parser: CommandParser,
    loader: ModuleLoader,
    events: EventBus,
}

impl Kernel {
    pub fn new(catalog: BuiltinCatalog, paths: KernelPaths) -> Self {
        Self {
            boot_time: Instant::now(),
            phase: KernelPhase::Uninitialized,
            paths,
            config: BootConfig::default(),
            registry: ModuleRegistry::new(),
            conflicts: Vec::new(),
            parser: CommandParser::default(),
            loader: ModuleLoader::new(catalog),
            events: EventBus::new(),
        }
    }

    /// Sets the parser identity and loads the boot configuration.
    pub fn boot(
        &mut self,
        name: impl Into<String>,
        about: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<(), KernelError> {
        self.expect_phase(KernelPhase::Uninitialized)?;
        self.parser.set_identity(name, about, version);
        self.config = BootConfigLoader::new(&self.paths.boot_config).load();
        self.phase = KernelPhase::Configuring;
        info!(
            "event=kernel_boot module=kernel status=configuring name={} config={} configured_modules={}",
            self.parser.name(),
            self.paths.boot_config.display(),
            self.config.modules.len()
        );
        Ok(())
    }

    /// Registers a compiled-in module ahead of boot and records it as
    /// statically loaded. Boot configuration can no longer disable it.
    pub fn install_static(
        &mut self,
        name: &str,
        module: &dyn CommandModule,
    ) -> Result<(), KernelError> {
        self.expect_phase(KernelPhase::Configuring)?;
        if self.registry.get(name).is_some_and(ModuleState::loaded) {
            return Ok(());
        }

        run_registration(module, name, &mut self.parser, &self.config).map_err(|source| {
            KernelError::StaticModule {
                name: name.to_string(),
                source,
            }
        })?;
        self.registry.mark_statically_loaded(name);
        Ok(())
    }

    /// Subscribes to a kernel event. Subscribe before [`probe_modules`](Self::probe_modules)
    /// to observe `modules:loaded`.
    pub fn listen(&self, kind: KernelEventKind, callback: impl Fn(&KernelEvent) + 'static) {
        self.events.subscribe(kind, callback);
    }

    /// Loads enabled built-ins, then non-conflicting user modules, and emits
    /// `modules:loaded` once.
    pub fn probe_modules(&mut self) -> Result<LoadSummary, KernelError> {
        self.expect_phase(KernelPhase::Configuring)?;
        self.phase = KernelPhase::Loading;

        let enabled: Vec<_> = self
            .config
            .enabled_modules()
            .map(|(name, config)| (name.to_string(), config.clone()))
            .collect();
        let mut target = LoadTarget {
            registry: &mut self.registry,
            parser: &mut self.parser,
            config: &self.config,
        };
        for (name, config) in enabled {
            self.loader.register_builtin(&mut target, &name, config);
        }

        for (name, path) in discover_user_modules(&self.paths.user_modules_dir) {
            if let Some(existing) = target.registry.get(&name) {
                let conflict = ModuleConflict::new(existing, path);
                error!(
                    "event=module_conflict module=kernel status=refused name={} detail=\"{}\"",
                    name, conflict
                );
                self.conflicts.push(conflict);
                continue;
            }
            self.loader.register_user(&mut target, &name, &path);
        }

        let summary = self.registry.summary();
        self.phase = KernelPhase::Ready;
        info!(
            "event=kernel_boot module=kernel status=ready total={} loaded={} failed={} uptime_ms={}",
            summary.total,
            summary.loaded,
            summary.failed,
            self.uptime()
        );
        self.events.publish(&KernelEvent::ModulesLoaded {
            summary,
            uptime_ms: self.uptime(),
        });
        Ok(summary)
    }

    /// Dispatches the process arguments.
    pub fn process(&mut self) -> Result<(), KernelError> {
        self.process_from(std::env::args_os())
    }

    /// Dispatches `args` (including the program name) to the shared parser.
    pub fn process_from<I, T>(&mut self, args: I) -> Result<(), KernelError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.expect_phase(KernelPhase::Ready)?;
        self.phase = KernelPhase::Running;

        let ctx = DispatchContext {
            modules: &self.registry,
            conflicts: &self.conflicts,
            config: &self.config,
            user_modules_dir: &self.paths.user_modules_dir,
            command_names: self.parser.command_names(),
        };
        self.parser.dispatch(args, &ctx)?;
        Ok(())
    }

    /// Milliseconds since the kernel was constructed.
    pub fn uptime(&self) -> u128 {
        self.boot_time.elapsed().as_millis()
    }

    /// True iff every registered module is loaded.
    pub fn did_all_modules_load(&self) -> bool {
        self.registry.all_loaded()
    }

    /// Snapshot of all module states in registration order.
    pub fn modules(&self) -> Vec<ModuleState> {
        self.registry.all()
    }

    /// User modules refused during the last probe because their name was taken.
    pub fn conflicts(&self) -> &[ModuleConflict] {
        &self.conflicts
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub fn phase(&self) -> KernelPhase {
        self.phase
    }

    fn expect_phase(&self, expected: KernelPhase) -> Result<(), KernelError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(KernelError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("phase", &self.phase)
            .field("paths", &self.paths)
            .field("modules", &self.registry.count())
            .field("parser", &self.parser)
            .finish()
    }
}
