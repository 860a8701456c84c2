//! Document persistence
//!
//! Implementations of the `Persistence` collaborator: a pretty-printed JSON
//! file, an in-memory slot for tests and dry runs, and a write-behind wrapper
//! that moves saves off the evaluation thread.
//!
//! Loading is per record. A geofence or alert that does not parse is logged
//! and left out, and the file as found is copied to `<name>.corrupt` before
//! anything can overwrite it.

use crate::collaborators::Persistence;
use crate::types::{Alert, Geofence, GeofenceData, GeofenceError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Document with records kept as raw JSON until checked one by one
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    geofences: Vec<Value>,
    #[serde(default)]
    alerts: Vec<Value>,
}

/// Parse a saved document, dropping records that do not fit the schema
///
/// Returns the usable data and the number of rejected records. Only a
/// document that is not a `{ geofences, alerts }` object is an error.
pub fn parse_document(content: &str) -> Result<(GeofenceData, usize)> {
    let raw: RawDocument = serde_json::from_str(content)?;
    let mut rejected = 0;
    let geofences: Vec<Geofence> = keep_parsable("geofence", raw.geofences, &mut rejected);
    let alerts: Vec<Alert> = keep_parsable("alert", raw.alerts, &mut rejected);
    Ok((GeofenceData { geofences, alerts }, rejected))
}

fn keep_parsable<T: DeserializeOwned>(what: &str, records: Vec<Value>, rejected: &mut usize) -> Vec<T> {
    let mut kept = Vec::with_capacity(records.len());
    for (index, value) in records.into_iter().enumerate() {
        let id = value.get("id").and_then(Value::as_str).map(str::to_string);
        match serde_json::from_value(value) {
            Ok(record) => kept.push(record),
            Err(e) => {
                *rejected += 1;
                log::warn!(
                    "Skipping unreadable {} #{} ({}): {}",
                    what,
                    index,
                    id.as_deref().unwrap_or("no id"),
                    e
                );
            }
        }
    }
    kept
}

/// Stores `{ "geofences": [...], "alerts": [...] }` in a JSON file
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Create a persistence backed by `path` (the file need not exist yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a damaged file is preserved: `<name>.corrupt` next to it
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    fn keep_backup(&self) -> Result<()> {
        let backup = self.backup_path();
        fs::copy(&self.path, &backup)?;
        log::warn!("Kept a copy of {:?} as {:?}", self.path, backup);
        Ok(())
    }
}

impl Persistence for JsonFilePersistence {
    fn load(&self) -> Result<GeofenceData> {
        if !self.path.exists() {
            log::debug!("No data file at {:?}, starting empty", self.path);
            return Ok(GeofenceData::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let (data, rejected) = match parse_document(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Data file {:?} is unreadable: {}", self.path, e);
                self.keep_backup()?;
                return Ok(GeofenceData::default());
            }
        };
        if rejected > 0 {
            log::warn!("Dropped {} unreadable records from {:?}", rejected, self.path);
            self.keep_backup()?;
        }

        log::info!(
            "Loaded {} geofences and {} alerts from {:?}",
            data.geofences.len(),
            data.alerts.len(),
            self.path
        );
        Ok(data)
    }

    fn save(&self, data: &GeofenceData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(data)?;
        // Temp file then rename
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        log::debug!("Saved geofence data to {:?}", self.path);
        Ok(())
    }
}

/// Keeps the last saved document in memory
///
/// Clones share the same slot, so a test can keep one handle and give the
/// other to a store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    slot: Arc<Mutex<GeofenceData>>,
}

impl MemoryPersistence {
    /// Create an empty in-memory persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory persistence pre-filled with a document
    pub fn with_data(data: GeofenceData) -> Self {
        Self {
            slot: Arc::new(Mutex::new(data)),
        }
    }

    /// Copy of the last saved document
    pub fn snapshot(&self) -> GeofenceData {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<GeofenceData> {
        Ok(self.snapshot())
    }

    fn save(&self, data: &GeofenceData) -> Result<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| GeofenceError::Persistence("memory slot poisoned".to_string()))?;
        *guard = data.clone();
        Ok(())
    }
}

enum WriteRequest {
    Save(GeofenceData),
    Flush(Sender<()>),
}

/// Hands saves to a writer thread so callers never wait on storage
///
/// Queued documents are coalesced: only the newest one is written. Failed
/// writes are logged as warnings. Dropping the wrapper writes whatever is
/// still queued before returning.
pub struct WriteBehindPersistence {
    inner: Arc<dyn Persistence + Send + Sync>,
    tx: Option<Sender<WriteRequest>>,
    join: Option<JoinHandle<()>>,
}

impl WriteBehindPersistence {
    /// Start a writer thread in front of `inner`
    pub fn spawn<P>(inner: P) -> Result<Self>
    where
        P: Persistence + Send + Sync + 'static,
    {
        let inner: Arc<dyn Persistence + Send + Sync> = Arc::new(inner);
        let (tx, rx) = unbounded::<WriteRequest>();
        let writer = Arc::clone(&inner);

        let join = thread::Builder::new()
            .name("geofence-writer".to_string())
            .spawn(move || writer_loop(writer, rx))
            .map_err(|e| GeofenceError::Persistence(format!("failed to spawn writer thread: {}", e)))?;

        Ok(Self {
            inner,
            tx: Some(tx),
            join: Some(join),
        })
    }

    fn send(&self, request: WriteRequest) -> Result<()> {
        self.tx
            .as_ref()
            .and_then(|tx| tx.send(request).ok())
            .ok_or_else(|| GeofenceError::Persistence("writer thread is gone".to_string()))
    }
}

impl Persistence for WriteBehindPersistence {
    fn load(&self) -> Result<GeofenceData> {
        self.flush()?;
        self.inner.load()
    }

    fn save(&self, data: &GeofenceData) -> Result<()> {
        self.send(WriteRequest::Save(data.clone()))
    }

    fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.send(WriteRequest::Flush(ack_tx))?;
        ack_rx
            .recv()
            .map_err(|_| GeofenceError::Persistence("writer thread is gone".to_string()))
    }
}

impl Drop for WriteBehindPersistence {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain and exit
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("Writer thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for WriteBehindPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBehindPersistence")
            .field("running", &self.tx.is_some())
            .finish()
    }
}

fn writer_loop(inner: Arc<dyn Persistence + Send + Sync>, rx: Receiver<WriteRequest>) {
    while let Ok(first) = rx.recv() {
        let mut latest = None;
        let mut waiting = Vec::new();

        for request in std::iter::once(first).chain(rx.try_iter()) {
            match request {
                WriteRequest::Save(data) => latest = Some(data),
                WriteRequest::Flush(ack) => waiting.push(ack),
            }
        }

        if let Some(data) = latest {
            if let Err(e) = inner.save(&data) {
                log::warn!("Failed to save geofences: {}", e);
            }
        }
        for ack in waiting {
            let _ = ack.send(());
        }
    }
    log::debug!("Writer thread finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinate, Geofence, GeofenceType};

    fn sample_data() -> GeofenceData {
        GeofenceData {
            geofences: vec![Geofence::circle(
                "gf-1",
                "Plant",
                GeofenceType::Factory,
                Coordinate::new(37.7749, -122.4194),
                100.0,
            )],
            alerts: Vec::new(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("absent.json"));
        assert_eq!(persistence.load().unwrap(), GeofenceData::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("nested/data.json"));

        persistence.save(&sample_data()).unwrap();
        assert_eq!(persistence.load().unwrap(), sample_data());
    }

    #[test]
    fn test_corrupt_file_loads_empty_and_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").unwrap();

        let persistence = JsonFilePersistence::new(&path);
        assert_eq!(persistence.load().unwrap(), GeofenceData::default());
        assert_eq!(persistence.backup_path(), dir.path().join("data.json.corrupt"));
        assert_eq!(fs::read_to_string(persistence.backup_path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_parse_document_skips_bad_records() {
        let content = r#"{
            "geofences": [
                { "id": "ok", "name": "Ok", "center": { "latitude": 1.0, "longitude": 2.0 }, "radius": 10 },
                { "id": "nameless", "center": { "latitude": 1.0, "longitude": 2.0 } },
                { "id": "odd", "name": "Odd", "type": "harbour" },
                { "id": "wide", "name": "Wide", "radius": "large" }
            ],
            "alerts": [
                { "id": "late", "geofenceId": "ok", "type": "enter", "timestamp": "yesterday",
                  "location": { "latitude": 1.0, "longitude": 2.0 }, "message": "Entered Ok (custom)" }
            ]
        }"#;

        let (data, rejected) = parse_document(content).unwrap();
        assert_eq!(rejected, 4);
        assert_eq!(data.geofences.len(), 1);
        assert_eq!(data.geofences[0].id, "ok");
        assert!(data.alerts.is_empty());

        assert!(parse_document("42").is_err());
    }

    #[test]
    fn test_clean_load_leaves_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("data.json"));
        persistence.save(&sample_data()).unwrap();
        persistence.load().unwrap();
        assert!(!persistence.backup_path().exists());
    }

    #[test]
    fn test_write_behind_reaches_inner_on_flush() {
        let memory = MemoryPersistence::new();
        let persistence = WriteBehindPersistence::spawn(memory.clone()).unwrap();

        persistence.save(&GeofenceData::default()).unwrap();
        persistence.save(&sample_data()).unwrap();
        persistence.flush().unwrap();
        assert_eq!(memory.snapshot(), sample_data());
        assert_eq!(persistence.load().unwrap(), sample_data());
    }

    #[test]
    fn test_write_behind_drains_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        {
            let persistence = WriteBehindPersistence::spawn(JsonFilePersistence::new(&path)).unwrap();
            persistence.save(&sample_data()).unwrap();
        }
        assert_eq!(JsonFilePersistence::new(&path).load().unwrap(), sample_data());
    }

    #[test]
    fn test_memory_persistence_shares_slot() {
        let handle = MemoryPersistence::new();
        let other = handle.clone();
        other.save(&sample_data()).unwrap();
        assert_eq!(handle.snapshot(), sample_data());
    }
}
