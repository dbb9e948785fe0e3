use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// Per-space last-processed timestamps, persisted as whole-file JSON.
/// Writes go through a temp file and rename so a crash never leaves a
/// half-written state file behind.
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(data_dir: &str) -> Self {
        Self {
            path: Path::new(data_dir).join("replication.json"),
        }
    }

    pub fn load(&self) -> Result<HashMap<String, i64>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", self.path.display()))
    }

    pub fn save(&self, watermarks: &HashMap<String, i64>) -> Result<()> {
        let contents = serde_json::to_string(watermarks)?;
        write_atomic(&self.path, contents.as_bytes())?;
        info!(path = %self.path.display(), spaces = watermarks.len(), "Watermarks saved");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandledEntry {
    pub id: String,
    pub ts: i64,
}

/// Proposal ids already pushed through the pipeline, kept long enough to
/// dedupe re-fetches of the same closing window across runs.
pub struct HandledStore {
    path: PathBuf,
}

impl HandledStore {
    pub fn new(data_dir: &str) -> Self {
        Self {
            path: Path::new(data_dir).join("replication_proposals.json"),
        }
    }

    pub fn load(&self) -> Result<Vec<HandledEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", self.path.display()))
    }

    pub fn save(&self, entries: &[HandledEntry]) -> Result<()> {
        let contents = serde_json::to_string(entries)?;
        write_atomic(&self.path, contents.as_bytes())
    }
}

pub fn prune(entries: Vec<HandledEntry>, now: i64, max_age: i64) -> Vec<HandledEntry> {
    entries
        .into_iter()
        .filter(|entry| entry.ts > now - max_age)
        .collect()
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} over {}", tmp.display(), path.display()))?;
    Ok(())
}
