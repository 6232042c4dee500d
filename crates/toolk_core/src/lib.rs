//! Module kernel for the `toolk` command-line toolkit.
//!
//! Commands live in independently loadable modules. The kernel loads the
//! boot configuration, registers built-in and user modules against one shared
//! command parser, isolates per-module failures, and announces boot completion.

pub mod config;
pub mod events;
pub mod kernel;
pub mod logging;
pub mod module;
pub mod parser;

pub use config::{BootConfig, BootConfigLoader, ConfigError, KernelPaths, ModuleConfig};
pub use events::{EventBus, KernelEvent, KernelEventKind, LoadSummary, EVENT_MODULES_LOADED};
pub use kernel::discovery::{discover_user_modules, MODULE_ENTRY_FILE, MODULE_FILE_EXTENSION};
pub use kernel::registry::{
    ModuleConflict, ModuleOrigin, ModuleRegistry, ModuleState, ModuleStatus,
};
pub use kernel::{Kernel, KernelError, KernelPhase};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use module::manifest::{ManifestError, UserModuleManifest};
pub use module::{BootContext, BuiltinCatalog, CommandModule, ModuleError, ModuleFactory};
pub use parser::{CommandError, CommandParser, DispatchContext, ParserError};
