//! JSON snapshots of the rating store.
//!
//! Records are stored as flat lists; the composite keys used in memory are
//! rebuilt on load. Saving writes a temp file next to the target and renames
//! it into place, so a crash never leaves a half-written snapshot.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use quizrank_core::error::StoreError;
use quizrank_core::model::{Attempt, Course, Question, Student, Watermark};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable image of every record in a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
    #[serde(default)]
    pub watermarks: Vec<Watermark>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            courses: Vec::new(),
            students: Vec::new(),
            questions: Vec::new(),
            attempts: Vec::new(),
            watermarks: Vec::new(),
        }
    }
}

/// Read a snapshot. A missing file is not an error and yields `None`.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
        StoreError::Serialization(format!("failed to parse {}: {e}", path.display()))
    })?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StoreError::Serialization(format!(
            "{} has snapshot version {}, this build reads up to {SNAPSHOT_VERSION}",
            path.display(),
            snapshot.version
        )));
    }
    Ok(Some(snapshot))
}

/// Write a snapshot atomically, creating parent directories as needed.
pub fn save_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
