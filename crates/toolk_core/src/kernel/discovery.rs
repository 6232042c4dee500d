//! User module discovery.
//!
//! # Responsibility
//! - Find candidate user modules without loading them.
//!
//! # Invariants
//! - File modules (`<name>.toml`) are collected before directory modules
//!   (`<name>/index.toml`); a directory module never replaces a file module
//!   of the same name.
//! - A missing or unreadable directory yields an empty map.

use log::debug;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};

/// Extension of a direct file module.
pub const MODULE_FILE_EXTENSION: &str = "toml";
/// Entry point of a directory module. Reserved; never a file module.
pub const MODULE_ENTRY_FILE: &str = "index.toml";

/// Maps module name to absolute manifest path.
pub fn discover_user_modules(dir: &Path) -> BTreeMap<String, PathBuf> {
    let mut modules = BTreeMap::new();

    let root = match dir.canonicalize() {
        Ok(root) => root,
        Err(err) => {
            debug!(
                "event=module_discovery module=kernel status=skipped dir={} reason={}",
                dir.display(),
                err
            );
            return modules;
        }
    };
    let entries = match read_entries(&root) {
        Some(entries) => entries,
        None => return modules,
    };

    for entry in &entries {
        if let Some((name, path)) = file_module(entry) {
            modules.entry(name).or_insert(path);
        }
    }
    for entry in &entries {
        if let Some((name, path)) = directory_module(entry) {
            modules.entry(name).or_insert(path);
        }
    }

    debug!(
        "event=module_discovery module=kernel status=ok dir={} found={}",
        root.display(),
        modules.len()
    );
    modules
}

fn read_entries(root: &Path) -> Option<Vec<DirEntry>> {
    match fs::read_dir(root) {
        Ok(iter) => {
            let mut entries: Vec<DirEntry> = iter.filter_map(Result::ok).collect();
            entries.sort_by_key(DirEntry::file_name);
            Some(entries)
        }
        Err(err) => {
            debug!(
                "event=module_discovery module=kernel status=skipped dir={} reason={}",
                root.display(),
                err
            );
            None
        }
    }
}

fn file_module(entry: &DirEntry) -> Option<(String, PathBuf)> {
    let path = entry.path();
    if !path.is_file() {
        return None;
    }
    if entry.file_name() == OsStr::new(MODULE_ENTRY_FILE) {
        return None;
    }
    if path.extension() != Some(OsStr::new(MODULE_FILE_EXTENSION)) {
        return None;
    }
    let name = path.file_stem()?.to_str()?;
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), path.clone()))
}

fn directory_module(entry: &DirEntry) -> Option<(String, PathBuf)> {
    let path = entry.path();
    if !path.is_dir() {
        return None;
    }
    let manifest = path.join(MODULE_ENTRY_FILE);
    if !manifest.is_file() {
        return None;
    }
    let name = entry.file_name().to_str()?.to_string();
    Some((name, manifest))
}
