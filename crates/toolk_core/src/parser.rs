//! Shared command-line parser that modules attach subcommands to.
//!
//! # Responsibility
//! - Own the root `clap::Command` and one handler per top-level subcommand.
//! - Dispatch a parsed command line to the matching handler.
//!
//! # Invariants
//! - A subcommand name is registered at most once.
//! - The parser is cheap to checkpoint (`Clone`) so a failed module
//!   registration can be rolled back.

use crate::config::BootConfig;
use crate::kernel::registry::{ModuleConflict, ModuleRegistry};
use clap::ArgMatches;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::rc::Rc;

/// Subcommand handler.
pub type CommandHandler = Rc<dyn Fn(&ArgMatches, &DispatchContext<'_>) -> Result<(), CommandError>>;

/// Read-only kernel state visible to command handlers.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub modules: &'a ModuleRegistry,
    pub conflicts: &'a [ModuleConflict],
    pub config: &'a BootConfig,
    pub user_modules_dir: &'a Path,
    pub command_names: &'a [String],
}

/// Root parser plus the handler table.
#[derive(Clone, Default)]
pub struct CommandParser {
    root: clap::Command,
    handlers: BTreeMap<String, CommandHandler>,
    names: Vec<String>,
}

impl CommandParser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: clap::Command::new(name.into()),
            handlers: BTreeMap::new(),
            names: Vec::new(),
        }
    }

    /// Sets program name, description and version shown in help output.
    pub fn set_identity(
        &mut self,
        name: impl Into<String>,
        about: impl Into<String>,
        version: impl Into<String>,
    ) {
        let root = std::mem::take(&mut self.root);
        self.root = root
            .name(name.into())
            .about(about.into())
            .version(version.into());
    }

    pub fn name(&self) -> &str {
        self.root.get_name()
    }

    /// Attaches one top-level subcommand.
    pub fn add_command(
        &mut self,
        command: clap::Command,
        handler: impl Fn(&ArgMatches, &DispatchContext<'_>) -> Result<(), CommandError> + 'static,
    ) -> Result<(), ParserError> {
        let name = command.get_name().to_string();
        if name == RESERVED_HELP_COMMAND || self.handlers.contains_key(name.as_str()) {
            return Err(ParserError::DuplicateCommand(name));
        }

        let root = std::mem::take(&mut self.root);
        self.root = root.subcommand(command);
        self.handlers.insert(name.clone(), Rc::new(handler));
        self.names.push(name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered top-level subcommands in registration order.
    pub fn command_names(&self) -> &[String] {
        &self.names
    }

    /// Rendered top-level help text.
    pub fn render_help(&self) -> String {
        self.root.clone().render_help().to_string()
    }

    /// Parses `args` (including the program name) and runs the handler.
    ///
    /// A command line without a subcommand prints help.
    pub fn dispatch<I, T>(&self, args: I, ctx: &DispatchContext<'_>) -> Result<(), ParserError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.root.clone().try_get_matches_from(args)?;
        let Some((name, sub_matches)) = matches.subcommand() else {
            self.root.clone().print_help()?;
            return Ok(());
        };

        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ParserError::MissingHandler(name.to_string()))?;
        handler(sub_matches, ctx).map_err(|source| ParserError::Command {
            name: name.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for CommandParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandParser")
            .field("name", &self.root.get_name())
            .field("commands", &self.names)
            .finish()
    }
}

const RESERVED_HELP_COMMAND: &str = "help";

/// Parser registration and dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("command already registered: {0}")]
    DuplicateCommand(String),
    #[error("no handler registered for command: {0}")]
    MissingHandler(String),
    #[error(transparent)]
    Cli(#[from] clap::Error),
    #[error("command `{name}` failed: {source}")]
    Command {
        name: String,
        #[source]
        source: CommandError,
    },
    #[error("failed to write help: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by command handlers.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("`{program}` exited with {}", describe_exit(.code))]
    ExitStatus { program: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
