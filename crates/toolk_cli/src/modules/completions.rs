//! `toolk install-completions`: fish completion line for top-level commands.

use toolk_core::{BootContext, CommandModule, ModuleError};

const COMMAND_NAME: &str = "install-completions";

pub struct CompletionsModule;

impl CommandModule for CompletionsModule {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        let program = ctx.parser().name().to_string();
        ctx.add_command(
            clap::Command::new(COMMAND_NAME).about("Generate shell completions"),
            move |_, dispatch| {
                println!("{}", fish_script(&program, dispatch.command_names));
                Ok(())
            },
        )
    }
}

fn fish_script(program: &str, commands: &[String]) -> String {
    format!("complete -c {program} -f -a \"{}\"", commands.join(" "))
}
