//! Command module contracts.
//!
//! A module registers its subcommands against the shared parser through a
//! [`BootContext`] and reports failure as an ordinary `Err`. Built-in modules
//! are compiled in and looked up by name in a [`BuiltinCatalog`]; user modules
//! are manifest files (see [`manifest`]).

pub mod manifest;
mod user;

pub use user::UserModule;

use crate::config::BootConfig;
use crate::parser::{CommandError, CommandParser, DispatchContext, ParserError};
use clap::ArgMatches;
use manifest::ManifestError;
use std::collections::BTreeMap;

/// Capability every loadable module implements.
pub trait CommandModule {
    /// Attaches the module's commands to `ctx.parser()`.
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError>;
}

/// What a module sees while it registers.
pub struct BootContext<'a> {
    module_id: &'a str,
    parser: &'a mut CommandParser,
    config: &'a BootConfig,
}

impl<'a> BootContext<'a> {
    pub fn new(module_id: &'a str, parser: &'a mut CommandParser, config: &'a BootConfig) -> Self {
        Self {
            module_id,
            parser,
            config,
        }
    }

    pub fn parser(&mut self) -> &mut CommandParser {
        &mut *self.parser
    }

    /// Whole boot configuration, read-only.
    pub fn config(&self) -> &BootConfig {
        self.config
    }

    /// This module's own settings table, when configured.
    pub fn settings(&self) -> Option<&toml::Table> {
        self.config.module_settings(self.module_id)
    }

    /// Shorthand for `parser().add_command(..)` with module error mapping.
    pub fn add_command(
        &mut self,
        command: clap::Command,
        handler: impl Fn(&ArgMatches, &DispatchContext<'_>) -> Result<(), CommandError> + 'static,
    ) -> Result<(), ModuleError> {
        self.parser.add_command(command, handler)?;
        Ok(())
    }
}

/// Module load failures. Recorded per module; never fatal to boot.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("module not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error("module panicked during registration: {0}")]
    Panicked(String),
    #[error("{0}")]
    Failed(String),
}

/// Factory for one compiled-in module.
pub type ModuleFactory = fn() -> Box<dyn CommandModule>;

/// Compiled-in modules addressable by name from the boot configuration.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCatalog {
    factories: BTreeMap<String, ModuleFactory>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, factory: ModuleFactory) -> Self {
        self.insert(name, factory);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, factory: ModuleFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Creates a fresh instance of the named module.
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn CommandModule>> {
        self.factories.get(name).map(|factory| factory())
    }
}
