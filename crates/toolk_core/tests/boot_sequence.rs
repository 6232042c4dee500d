use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use toolk_core::{
    BootContext, BuiltinCatalog, CommandError, CommandModule, Kernel, KernelError, KernelEvent,
    KernelEventKind, KernelPaths, KernelPhase, LoadSummary, ModuleError, ModuleOrigin,
    ParserError,
};

struct Brightness;

impl CommandModule for Brightness {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        ctx.add_command(clap::Command::new("brightness"), |_, _| Ok(()))
    }
}

struct Bar;

impl CommandModule for Bar {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        ctx.add_command(clap::Command::new("bar"), |_, _| Ok(()))
    }
}

struct Whois;

impl CommandModule for Whois {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        ctx.add_command(clap::Command::new("whois"), |_, _| Ok(()))
    }
}

struct Ai;

impl CommandModule for Ai {
    fn register(&self, ctx: &mut BootContext<'_>) -> Result<(), ModuleError> {
        let model = ctx
            .settings()
            .and_then(|settings| settings.get("model"))
            .and_then(|value| value.as_str())
            .ok_or_else(|| ModuleError::Failed("ai requires a `model` setting".to_string()))?
            .to_string();
        ctx.add_command(clap::Command::new("ai"), move |_, _| {
            if model.is_empty() {
                Err(CommandError::Failed("empty model".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

fn catalog() -> BuiltinCatalog {
    BuiltinCatalog::new()
        .with("brightness", || -> Box<dyn CommandModule> { Box::new(Brightness) })
        .with("bar", || -> Box<dyn CommandModule> { Box::new(Bar) })
        .with("whois", || -> Box<dyn CommandModule> { Box::new(Whois) })
        .with("ai", || -> Box<dyn CommandModule> { Box::new(Ai) })
}

fn write_boot_config(app_dir: &Path, contents: &str) {
    fs::create_dir_all(app_dir).expect("create app dir");
    fs::write(app_dir.join("boot.toml"), contents).expect("write boot.toml");
}

fn write_user_module(app_dir: &Path, file_name: &str, contents: &str) {
    let path = app_dir.join("modules").join(file_name);
    fs::create_dir_all(path.parent().expect("module parent")).expect("create module dir");
    fs::write(path, contents).expect("write module manifest");
}

fn booted_kernel(app_dir: &Path) -> (Kernel, Rc<RefCell<Vec<LoadSummary>>>) {
    let mut kernel = Kernel::new(catalog(), KernelPaths::under(app_dir));
    kernel
        .boot("toolk", "A modular CLI toolkit", "0.1.0")
        .expect("boot from uninitialized");

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    kernel.listen(KernelEventKind::ModulesLoaded, move |event| {
        let KernelEvent::ModulesLoaded { summary, .. } = event;
        sink.borrow_mut().push(*summary);
    });
    (kernel, events)
}

#[test]
fn enabled_builtins_load_and_disabled_ones_are_absent() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(
        dir.path(),
        "[modules.brightness]\nenabled = true\n\n[modules.whois]\nenabled = false\n",
    );

    let (mut kernel, events) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(
        summary,
        LoadSummary {
            total: 1,
            loaded: 1,
            failed: 0
        }
    );
    assert!(kernel.registry().get("brightness").expect("brightness").loaded());
    assert!(kernel.registry().get("whois").is_none());
    assert_eq!(*events.borrow(), vec![summary]);
    assert!(kernel.did_all_modules_load());
    assert_eq!(kernel.phase(), KernelPhase::Ready);
}

#[test]
fn missing_config_counts_only_statically_preregistered_modules() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut kernel, events) = booted_kernel(dir.path());
    kernel
        .install_static("whois", &Whois)
        .expect("static install");

    assert!(kernel.config().modules.is_empty());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary.total, 1);
    assert_eq!(events.borrow().len(), 1);
    assert!(kernel.parser().contains("whois"));
}

#[test]
fn user_module_and_builtin_both_attempted() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.bar]\n");
    write_user_module(dir.path(), "foo.toml", "exec = \"true\"\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary.total, 2);
    assert_eq!(summary.loaded, 2);
    assert_eq!(
        kernel.registry().get("foo").expect("foo").origin,
        ModuleOrigin::User
    );
}

#[test]
fn failing_user_module_is_counted_without_stopping_boot() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.bar]\nenabled = true\n");
    write_user_module(dir.path(), "foo.toml", "exec = [\n");

    let (mut kernel, events) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(
        summary,
        LoadSummary {
            total: 2,
            loaded: 1,
            failed: 1
        }
    );
    assert_eq!(*events.borrow(), vec![summary]);
    assert!(!kernel.did_all_modules_load());
    assert!(kernel.registry().get("foo").expect("foo").error().is_some());
    assert!(kernel.registry().get("bar").expect("bar").loaded());
    assert_eq!(kernel.registry().count_pending(), 0);
}

#[test]
fn user_module_conflicting_with_builtin_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.brightness]\nenabled = true\n");
    write_user_module(dir.path(), "brightness.toml", "exec = \"true\"\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary.total, 1);
    let modules = kernel.modules();
    let entries: Vec<_> = modules.iter().filter(|state| state.id == "brightness").collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].origin, ModuleOrigin::Builtin);
    assert!(entries[0].loaded());

    let user_path = dir
        .path()
        .join("modules")
        .join("brightness.toml")
        .canonicalize()
        .expect("canonical user path");
    let conflicts = kernel.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].name, "brightness");
    assert_eq!(conflicts[0].existing_path, Path::new("modules/brightness"));
    assert_eq!(conflicts[0].user_path, user_path);

    let diagnostic = conflicts[0].to_string();
    assert!(diagnostic.contains("modules/brightness"));
    assert!(diagnostic.contains(&user_path.display().to_string()));
}

#[test]
fn user_module_names_outside_scaffold_rules_still_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_user_module(dir.path(), "my_tool.toml", "exec = \"true\"\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(
        summary,
        LoadSummary {
            total: 1,
            loaded: 1,
            failed: 0
        }
    );
    assert!(kernel.registry().get("my_tool").expect("my_tool").loaded());
    assert!(kernel.conflicts().is_empty());
}

#[test]
fn registry_entries_are_frozen_after_boot() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_user_module(dir.path(), "foo.toml", "exec = ");

    let (mut kernel, _) = booted_kernel(dir.path());
    kernel.probe_modules().expect("probe modules");
    let before = kernel.registry().get("foo").cloned().expect("foo");
    assert_eq!(before.origin, ModuleOrigin::User);
    assert!(before.error().is_some());

    let err = kernel
        .install_static("foo", &Whois)
        .expect_err("pre-registration after boot must fail");

    assert!(matches!(err, KernelError::InvalidPhase { .. }));
    assert_eq!(kernel.registry().get("foo"), Some(&before));
    assert!(!kernel.parser().contains("whois"));
}

#[test]
fn user_module_conflicting_with_static_module_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_user_module(dir.path(), "whois/index.toml", "exec = \"true\"\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    kernel.install_static("whois", &Whois).expect("static install");
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary.total, 1);
    assert_eq!(
        kernel.registry().get("whois").expect("whois").origin,
        ModuleOrigin::Builtin
    );
}

#[test]
fn enabling_a_statically_loaded_module_does_not_register_it_twice() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.whois]\nenabled = true\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    kernel.install_static("whois", &Whois).expect("static install");
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary.total, 1);
    assert_eq!(summary.loaded, 1);
    assert_eq!(kernel.parser().command_names(), ["whois".to_string()]);
}

#[test]
fn disabling_a_statically_loaded_module_keeps_it_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.whois]\nenabled = false\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    kernel.install_static("whois", &Whois).expect("static install");
    kernel.probe_modules().expect("probe modules");

    assert!(kernel.registry().get("whois").expect("whois").loaded());
    assert!(kernel.parser().contains("whois"));
}

#[test]
fn enabled_builtin_missing_from_catalog_fails_softly() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.record]\n[modules.brightness]\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.loaded, 1);
    assert_eq!(
        kernel.registry().get("record").and_then(|state| state.error()),
        Some("module not found: modules/record")
    );
}

#[test]
fn modules_read_their_own_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(
        dir.path(),
        "[modules.ai]\nprovider = \"ollama\"\nmodel = \"llama3\"\n",
    );

    let (mut kernel, _) = booted_kernel(dir.path());
    kernel.probe_modules().expect("probe modules");
    assert!(kernel.registry().get("ai").expect("ai").loaded());
    kernel
        .process_from(["toolk", "ai"])
        .expect("ai command succeeds");
}

#[test]
fn module_without_required_settings_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.ai]\nprovider = \"ollama\"\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary.failed, 1);
    assert!(!kernel.parser().contains("ai"));
}

#[test]
fn corrupt_config_degrades_to_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_boot_config(dir.path(), "[modules.brightness\nenabled = tru");

    let (mut kernel, events) = booted_kernel(dir.path());
    let summary = kernel.probe_modules().expect("probe modules");

    assert_eq!(summary, LoadSummary::default());
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn phases_cannot_be_reentered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut kernel, events) = booted_kernel(dir.path());

    let err = kernel
        .process_from(["toolk"])
        .expect_err("process before ready must fail");
    assert!(matches!(
        err,
        KernelError::InvalidPhase {
            expected: KernelPhase::Ready,
            actual: KernelPhase::Configuring
        }
    ));

    kernel.probe_modules().expect("first probe");
    let err = kernel.probe_modules().expect_err("second probe must fail");
    assert!(matches!(err, KernelError::InvalidPhase { .. }));
    assert_eq!(events.borrow().len(), 1, "modules:loaded emitted exactly once");

    let err = kernel
        .install_static("whois", &Whois)
        .expect_err("static install after boot must fail");
    assert!(matches!(err, KernelError::InvalidPhase { .. }));
}

#[test]
fn process_dispatches_user_module_and_reports_exit_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_user_module(dir.path(), "fail.toml", "exec = \"false\"\n");

    let (mut kernel, _) = booted_kernel(dir.path());
    kernel.probe_modules().expect("probe modules");

    let err = kernel
        .process_from(["toolk", "fail"])
        .expect_err("non-zero exit must surface");
    match err {
        KernelError::Parser(ParserError::Command { name, source }) => {
            assert_eq!(name, "fail");
            assert!(matches!(
                source,
                CommandError::ExitStatus { code: Some(1), .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(kernel.phase(), KernelPhase::Running);
}

#[test]
fn uptime_is_monotonic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (kernel, _) = booted_kernel(dir.path());
    let first = kernel.uptime();
    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(kernel.uptime() >= first + 1);
}
