//! `toolk tool`: scaffolds user modules in the module directory.

use clap::{Arg, ArgMatches};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use toolk_core::{
    BootContext, CommandError, CommandModule, DispatchContext, ModuleError, UserModuleManifest,
    MODULE_ENTRY_FILE, MODULE_FILE_EXTENSION,
};

const COMMAND_NAME: &str = "tool";
const SHELL_SETTING: &str = "shell";
const DEFAULT_SHELL: &str = "sh";

static MODULE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("valid module name regex"));

pub struct ToolModule;

impl CommandModule for ToolModule {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        let shell = match ctx.settings().and_then(|settings| settings.get(SHELL_SETTING)) {
            None => DEFAULT_SHELL.to_string(),
            Some(value) => value
                .as_str()
                .filter(|shell| !shell.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    ModuleError::Failed(format!("setting `{SHELL_SETTING}` must be a string"))
                })?,
        };

        let command = clap::Command::new(COMMAND_NAME)
            .about("Create user modules")
            .subcommand_required(true)
            .subcommand(
                clap::Command::new("add")
                    .about("Scaffold an empty module manifest")
                    .arg(Arg::new("name").required(true)),
            )
            .subcommand(
                clap::Command::new("from")
                    .about("Wrap an existing script as a module")
                    .arg(Arg::new("script").required(true))
                    .arg(Arg::new("name").long("name").short('n').required(true)),
            );

        ctx.add_command(command, move |matches, dispatch| run(matches, dispatch, &shell))
    }
}

fn run(
    matches: &ArgMatches,
    dispatch: &DispatchContext<'_>,
    shell: &str,
) -> Result<(), CommandError> {
    let modules_dir = dispatch.user_modules_dir;
    let created = match matches.subcommand() {
        Some(("add", sub)) => scaffold_module(modules_dir, required(sub, "name")?)?,
        Some(("from", sub)) => import_script(
            modules_dir,
            required(sub, "name")?,
            Path::new(required(sub, "script")?),
            shell,
        )?,
        Some((other, _)) => {
            return Err(CommandError::InvalidArgument(format!("unknown subcommand: {other}")))
        }
        None => return Err(CommandError::InvalidArgument("missing subcommand".to_string())),
    };
    info!(
        "event=tool_module_created module=tool status=ok path={}",
        created.display()
    );
    println!("Created {}", created.display());
    Ok(())
}

fn required<'m>(matches: &'m ArgMatches, id: &str) -> Result<&'m str, CommandError> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| CommandError::InvalidArgument(format!("missing <{id}>")))
}

/// New module names start with a letter, followed by letters, digits or `-`.
fn check_name(name: &str) -> Result<(), CommandError> {
    if MODULE_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(CommandError::InvalidArgument(format!(
            "invalid module name `{name}`: use letters, digits and dashes"
        )))
    }
}

/// Writes `<modules_dir>/<name>.toml` with a placeholder command.
fn scaffold_module(modules_dir: &Path, name: &str) -> Result<PathBuf, CommandError> {
    check_name(name)?;
    let target = modules_dir.join(format!("{name}.{MODULE_FILE_EXTENSION}"));
    let directory_entry = modules_dir.join(name).join(MODULE_ENTRY_FILE);
    if directory_entry.exists() {
        return Err(already_exists(&directory_entry));
    }

    let manifest = UserModuleManifest {
        description: Some(format!("{name} module")),
        exec: "echo".to_string(),
        args: vec![format!("{name}: edit {} to get started", target.display())],
    };
    fs::create_dir_all(modules_dir)?;
    write_new(&target, &render(&manifest)?)?;
    Ok(target)
}

/// Copies `script` into `<modules_dir>/<name>/` and writes an `index.toml`
/// that runs it with `shell`.
fn import_script(
    modules_dir: &Path,
    name: &str,
    script: &Path,
    shell: &str,
) -> Result<PathBuf, CommandError> {
    check_name(name)?;
    if !script.is_file() {
        return Err(CommandError::InvalidArgument(format!(
            "script not found: {}",
            script.display()
        )));
    }
    let file_entry = modules_dir.join(format!("{name}.{MODULE_FILE_EXTENSION}"));
    if file_entry.exists() {
        return Err(already_exists(&file_entry));
    }
    let module_dir = modules_dir.join(name);
    if module_dir.exists() {
        return Err(already_exists(&module_dir));
    }
    let file_name = script.file_name().ok_or_else(|| {
        CommandError::InvalidArgument(format!("not a file path: {}", script.display()))
    })?;

    fs::create_dir_all(&module_dir)?;
    let copied = module_dir.join(file_name);
    fs::copy(script, &copied)?;

    let manifest = UserModuleManifest {
        description: Some(format!("Runs {}", Path::new(file_name).display())),
        exec: shell.to_string(),
        args: vec![copied.display().to_string()],
    };
    let target = module_dir.join(MODULE_ENTRY_FILE);
    write_new(&target, &render(&manifest)?)?;
    Ok(target)
}

fn render(manifest: &UserModuleManifest) -> Result<String, CommandError> {
    manifest
        .to_toml_string()
        .map_err(|err| CommandError::Failed(err.to_string()))
}

fn write_new(path: &Path, contents: &str) -> Result<(), CommandError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::AlreadyExists => already_exists(path),
            _ => CommandError::Io(err),
        })?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

fn already_exists(path: &Path) -> CommandError {
    CommandError::Failed(format!("refusing to overwrite {}", path.display()))
}
