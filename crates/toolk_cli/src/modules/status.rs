//! `toolk modules`: prints the kernel's module table.

use toolk_core::{BootContext, CommandModule, ModuleConflict, ModuleError, ModuleState};

pub const MODULE_NAME: &str = "modules";

pub struct StatusModule;

impl CommandModule for StatusModule {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        ctx.add_command(
            clap::Command::new(MODULE_NAME).about("List loaded modules and their status"),
            |_, dispatch| {
                for line in render_table(&dispatch.modules.all()) {
                    println!("{line}");
                }
                for line in render_conflicts(dispatch.conflicts) {
                    println!("{line}");
                }
                Ok(())
            },
        )
    }
}

fn render_table(modules: &[ModuleState]) -> Vec<String> {
    let width = modules
        .iter()
        .map(|state| state.id.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut lines = vec![format!(
        "{:<width$}  {:<7}  {:<7}  PATH",
        "NAME", "ORIGIN", "STATUS"
    )];
    for state in modules {
        lines.push(format!(
            "{:<width$}  {:<7}  {:<7}  {}",
            state.id,
            state.origin.as_str(),
            state.status.as_str(),
            state.path.display()
        ));
        if let Some(error) = state.error() {
            lines.push(format!("{:<width$}  error: {error}", ""));
        }
    }
    lines
}

fn render_conflicts(conflicts: &[ModuleConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| format!("refused: {conflict}"))
        .collect()
}
