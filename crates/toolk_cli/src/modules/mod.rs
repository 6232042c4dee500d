//! Built-in command modules shipped with the binary.

mod completions;
mod status;
mod tool;

use toolk_core::{BuiltinCatalog, CommandModule, Kernel, KernelError};

/// Modules the boot configuration can enable by name.
pub fn catalog() -> BuiltinCatalog {
    BuiltinCatalog::new()
        .with("completions", completions_module)
        .with("tool", tool_module)
}

/// Registers modules that are always present, regardless of configuration.
pub fn install_static(kernel: &mut Kernel) -> Result<(), KernelError> {
    kernel.install_static(status::MODULE_NAME, &status::StatusModule)
}

fn completions_module() -> Box<dyn CommandModule> {
    Box::new(completions::CompletionsModule)
}

fn tool_module() -> Box<dyn CommandModule> {
    Box::new(tool::ToolModule)
}
