use std::fs;
use std::path::Path;

use toolk_core::discover_user_modules;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().expect("parent dir")).expect("create parent");
    fs::write(path, "exec = \"true\"\n").expect("write manifest");
}

#[test]
fn finds_file_and_directory_modules() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("foo.toml"));
    touch(&dir.path().join("bar").join("index.toml"));

    let modules = discover_user_modules(dir.path());
    let root = dir.path().canonicalize().expect("canonical root");

    assert_eq!(modules.len(), 2);
    assert_eq!(modules["foo"], root.join("foo.toml"));
    assert_eq!(modules["bar"], root.join("bar").join("index.toml"));
    assert!(modules.values().all(|path| path.is_absolute()));
}

#[test]
fn file_module_wins_over_directory_module_of_same_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("foo.toml"));
    touch(&dir.path().join("foo").join("index.toml"));

    let modules = discover_user_modules(dir.path());
    let root = dir.path().canonicalize().expect("canonical root");

    assert_eq!(modules.len(), 1);
    assert_eq!(modules["foo"], root.join("foo.toml"));
}

#[test]
fn directories_without_entry_point_and_nested_files_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(&dir.path().join("lib").join("helper.toml"));
    touch(&dir.path().join("deep").join("nested").join("index.toml"));
    fs::write(dir.path().join("README.md"), "# modules").expect("write readme");

    assert!(discover_user_modules(dir.path()).is_empty());
}
