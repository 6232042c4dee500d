//! Module registry: the single source of truth for what is loaded.

use crate::config::ModuleConfig;
use crate::events::LoadSummary;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Where a module comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Shipped with the program.
    Builtin,
    /// Discovered in the user module directory.
    User,
}

impl ModuleOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::User => "user",
        }
    }
}

impl Display for ModuleOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load status. `Pending` only exists while boot is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    Pending,
    Loaded,
    Failed(String),
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loaded => "loaded",
            Self::Failed(_) => "failed",
        }
    }
}

/// Registry entry for one module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleState {
    pub id: String,
    pub path: PathBuf,
    pub origin: ModuleOrigin,
    pub config: ModuleConfig,
    pub status: ModuleStatus,
}

impl ModuleState {
    /// New entry awaiting its load attempt.
    pub fn pending(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        origin: ModuleOrigin,
        config: ModuleConfig,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            origin,
            config,
            status: ModuleStatus::Pending,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded(&self) -> bool {
        self.status == ModuleStatus::Loaded
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            ModuleStatus::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ModuleStatus::Pending
    }
}

/// User module refused because its name was already registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConflict {
    pub name: String,
    pub existing_origin: ModuleOrigin,
    pub existing_path: PathBuf,
    pub user_path: PathBuf,
}

impl ModuleConflict {
    pub fn new(existing: &ModuleState, user_path: impl Into<PathBuf>) -> Self {
        Self {
            name: existing.id.clone(),
            existing_origin: existing.origin,
            existing_path: existing.path.clone(),
            user_path: user_path.into(),
        }
    }
}

impl Display for ModuleConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "user module `{}` at {} conflicts with {} module at {}; rename the user module",
            self.name,
            self.user_path.display(),
            self.existing_origin,
            self.existing_path.display()
        )
    }
}

/// Insertion-ordered table of module states keyed by module name.
///
/// Entries are never removed during the process lifetime.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: Vec<ModuleState>,
    index: BTreeMap<String, usize>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `state`, or replaces the entry of the same name in place.
    pub fn upsert(&mut self, state: ModuleState) {
        match self.index.get(state.id.as_str()) {
            Some(&position) => self.entries[position] = state,
            None => {
                self.index.insert(state.id.clone(), self.entries.len());
                self.entries.push(state);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleState> {
        self.index
            .get(name)
            .and_then(|&position| self.entries.get(position))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Records a compiled-in module whose registration already ran.
    pub fn mark_statically_loaded(&mut self, name: &str) {
        let mut state = ModuleState::pending(
            name,
            builtin_module_path(name),
            ModuleOrigin::Builtin,
            ModuleConfig::enabled(),
        );
        state.status = ModuleStatus::Loaded;
        self.upsert(state);
    }

    /// Flips an existing entry to loaded. Returns `false` for unknown names.
    pub fn mark_loaded(&mut self, name: &str) -> bool {
        self.set_status(name, ModuleStatus::Loaded)
    }

    /// Flips an existing entry to failed. Returns `false` for unknown names.
    pub fn mark_failed(&mut self, name: &str, error: impl Into<String>) -> bool {
        self.set_status(name, ModuleStatus::Failed(error.into()))
    }

    fn set_status(&mut self, name: &str, status: ModuleStatus) -> bool {
        let Some(&position) = self.index.get(name) else {
            return false;
        };
        self.entries[position].status = status;
        true
    }

    /// Snapshot of all entries in first-registration order.
    pub fn all(&self) -> Vec<ModuleState> {
        self.entries.clone()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_loaded(&self) -> usize {
        self.entries.iter().filter(|state| state.loaded()).count()
    }

    pub fn count_failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|state| state.error().is_some())
            .count()
    }

    pub fn count_pending(&self) -> usize {
        self.entries.iter().filter(|state| state.is_pending()).count()
    }

    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            total: self.count(),
            loaded: self.count_loaded(),
            failed: self.count_failed(),
        }
    }

    /// True when every registered module is loaded (vacuously true when empty).
    pub fn all_loaded(&self) -> bool {
        self.entries.iter().all(ModuleState::loaded)
    }
}

/// Logical path of a built-in module.
pub fn builtin_module_path(name: &str) -> PathBuf {
    PathBuf::from(format!("modules/{name}"))
}
