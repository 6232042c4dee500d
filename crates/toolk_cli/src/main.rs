//! `toolk` entry point.
//!
//! # Responsibility
//! - Start logging, boot the module kernel and hand argv to the shared parser.
//! - Map command outcomes to a process exit code.

mod modules;

use log::{info, warn};
use std::process::ExitCode;
use toolk_core::{
    default_log_level, init_logging, CommandError, Kernel, KernelError, KernelEvent,
    KernelEventKind, KernelPaths, ParserError,
};

const LOG_LEVEL_ENV: &str = "TOOLK_LOG";

fn main() -> ExitCode {
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    if let Err(err) = init_logging(&level, None) {
        eprintln!("toolk: logging disabled: {err}");
    }

    let mut kernel = Kernel::new(modules::catalog(), KernelPaths::from_env());
    if let Err(err) = boot(&mut kernel) {
        eprintln!("toolk: {err}");
        return ExitCode::FAILURE;
    }

    match kernel.process() {
        Ok(()) => ExitCode::SUCCESS,
        Err(KernelError::Parser(ParserError::Cli(err))) => err.exit(),
        Err(KernelError::Parser(ParserError::Command {
            source: CommandError::ExitStatus { code, .. },
            ..
        })) => exit_code_from_status(code),
        Err(err) => {
            eprintln!("toolk: {err}");
            ExitCode::FAILURE
        }
    }
}

fn boot(kernel: &mut Kernel) -> Result<(), KernelError> {
    kernel.boot("toolk", "A modular CLI toolkit", env!("CARGO_PKG_VERSION"))?;
    modules::install_static(kernel)?;

    kernel.listen(KernelEventKind::ModulesLoaded, |event| {
        let KernelEvent::ModulesLoaded { summary, uptime_ms } = event;
        info!("[Kernel] {}/{} modules loaded.", summary.loaded, summary.total);
        if summary.failed > 0 {
            warn!("[Kernel] {} module(s) failed to load.", summary.failed);
        }
        info!("[Kernel] Uptime: {uptime_ms}ms");
    });

    kernel.probe_modules()?;
    Ok(())
}

fn exit_code_from_status(code: Option<i32>) -> ExitCode {
    match code.and_then(|code| u8::try_from(code).ok()) {
        Some(code) if code != 0 => ExitCode::from(code),
        _ => ExitCode::FAILURE,
    }
}
