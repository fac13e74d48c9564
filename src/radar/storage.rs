//! State store abstraction for change detection.
//!
//! The state maps a token identity key to its most recent snapshot. It is
//! loaded once per run, mutated in memory, and written back as one whole-file
//! replace so a crash mid-write never leaves a partially written mapping.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::errors::RadarError;
use crate::radar::types::Snapshot;

/// Contract for the persisted `identity key -> Snapshot` mapping.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Replace the in-memory mapping with the persisted one.
    /// A store with nothing persisted yet loads as empty.
    async fn load(&mut self) -> Result<()>;

    /// Last snapshot recorded for `key`.
    fn get(&self, key: &str) -> Option<&Snapshot>;

    /// Replace the entry for `key`.
    fn put(&mut self, key: String, snapshot: Snapshot);

    /// Persist the whole mapping atomically.
    async fn save(&self) -> Result<()>;

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// JSON file backed state store.
#[derive(Debug)]
pub struct JsonFileStateStore {
    path: PathBuf,
    entries: BTreeMap<String, Snapshot>,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Create and load in one step.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(path);
        store.load().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, Snapshot> {
        &self.entries
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&mut self) -> Result<()> {
        let entries: Option<BTreeMap<String, Snapshot>> = read_json_optional(&self.path)
            .await
            .map_err(|e| RadarError::StateUnreadable {
                path: self.path.clone(),
                reason: format!("{:#}", e),
            })?;

        self.entries = entries.unwrap_or_default();
        info!("Loaded {} state entries from {}", self.entries.len(), self.path.display());
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&Snapshot> {
        self.entries.get(key)
    }

    fn put(&mut self, key: String, snapshot: Snapshot) {
        self.entries.insert(key, snapshot);
    }

    async fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.entries).await.map_err(|e| {
            RadarError::OutputUnwritable {
                path: self.path.clone(),
                reason: format!("{:#}", e),
            }
        })?;
        info!("Saved {} state entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// In-memory state store for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    entries: BTreeMap<String, Snapshot>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: BTreeMap<String, Snapshot>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, Snapshot> {
        &self.entries
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&Snapshot> {
        self.entries.get(key)
    }

    fn put(&mut self, key: String, snapshot: Snapshot) {
        self.entries.insert(key, snapshot);
    }

    async fn save(&self) -> Result<()> {
        debug!("MemoryStateStore holds {} entries", self.entries.len());
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Serialize `value` as pretty JSON and replace `path` in one rename.
///
/// The content is written to a sibling temporary file, synced, then renamed
/// over the destination, so readers only ever observe the old or the new file.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(value).context("Failed to serialize JSON")?;
    body.push(b'\n');

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid output path {}", path.display()))?;
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
    file.write_all(&body)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", tmp_path.display()))?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    debug!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}

/// Read JSON from `path`; `Ok(None)` when the file does not exist.
pub async fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}
