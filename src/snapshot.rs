//! Resolved token state persisted between builds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{Breakpoint, ClassSpec, RawValue, TokenConfig};
use crate::interner::VariableTable;
use crate::{Error, Result};

/// Default snapshot location, relative to the project directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = ".tokenframe/snapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakpointSnapshot {
    pub mobile: String,
    pub desktop: String,
}

impl BreakpointSnapshot {
    pub fn get(&self, breakpoint: Breakpoint) -> &str {
        match breakpoint {
            Breakpoint::Mobile => &self.mobile,
            Breakpoint::Desktop => &self.desktop,
        }
    }
}

/// Serializable projection of one build's resolved tokens.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub breakpoints: BreakpointSnapshot,
    pub font_family_map: BTreeMap<String, RawValue>,
    pub spacing_map: BTreeMap<String, RawValue>,
    pub colors: BTreeMap<String, RawValue>,
    pub classes: BTreeMap<String, ClassSpec>,
    /// Variable name to resolved value.
    pub variables: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn capture(config: &TokenConfig, table: &VariableTable) -> Self {
        let classes = config
            .classes
            .iter()
            .map(|(name, spec)| {
                let mut spec = spec.clone();
                spec.unknown.clear();
                for tier in [spec.mobile.as_mut(), spec.desktop.as_mut()]
                    .into_iter()
                    .flatten()
                {
                    tier.unknown.clear();
                }
                (name.clone(), spec)
            })
            .collect();

        Self {
            breakpoints: BreakpointSnapshot {
                mobile: config.breakpoints.mobile.to_string(),
                desktop: config.breakpoints.desktop.to_string(),
            },
            font_family_map: config.font_family_map.clone(),
            spacing_map: config.spacing_map.clone(),
            colors: config.colors.clone(),
            classes,
            variables: table.values_by_name(),
        }
    }
}

/// Where the previous build's snapshot lives.
pub trait SnapshotStore {
    /// `Ok(None)` when no snapshot has been stored yet.
    fn load(&self) -> Result<Option<Snapshot>>;

    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::io(&self.path, err)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| Error::Snapshot {
                path: self.path.clone(),
                message: err.to_string(),
            })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot).map_err(|err| Error::Snapshot {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        fs::write(&self.path, json).map_err(|err| Error::io(&self.path, err))?;
        tracing::debug!(path = %self.path.display(), "saved snapshot");
        Ok(())
    }
}

/// In-memory store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }

    pub fn current(&self) -> Option<Snapshot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.current())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        Ok(())
    }
}
