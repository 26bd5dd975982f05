use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{CustomerProfile, Offer};

/// Errors that can occur during snapshot operations.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Every profile and offer held by the engine at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Unique snapshot identifier
    pub id: String,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub profiles: Vec<CustomerProfile>,

    #[serde(default)]
    pub offers: Vec<Offer>,
}

impl StateSnapshot {
    pub fn new(profiles: Vec<CustomerProfile>, offers: Vec<Offer>) -> Self {
        StateSnapshot {
            id: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
            profiles,
            offers,
        }
    }
}

/// Write a snapshot to `path`.
///
/// The file is written next to its destination and renamed into place, so a
/// crash never leaves a half-written state file.
pub fn write_snapshot(path: impl AsRef<Path>, snapshot: &StateSnapshot) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Load a snapshot, or `None` when the file does not exist yet.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Option<StateSnapshot>, SnapshotError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(snapshot))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}
