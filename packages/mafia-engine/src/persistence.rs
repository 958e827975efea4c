use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::error::PersistError;
use crate::models::session::{GroupId, Session};

/// Crash-safe storage for running sessions.
pub trait SnapshotSink: Send + Sync {
    fn save(&self, session: &Session) -> Result<(), PersistError>;
    fn remove(&self, group: GroupId) -> Result<(), PersistError>;
    fn load_all(&self) -> Result<Vec<Session>, PersistError>;
}

/// One `<group>.json` per session under `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshots {
    dir: PathBuf,
}

impl JsonFileSnapshots {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, group: GroupId) -> PathBuf {
        self.dir.join(format!("{}.json", group))
    }
}

impl SnapshotSink for JsonFileSnapshots {
    fn save(&self, session: &Session) -> Result<(), PersistError> {
        let path = self.path_for(session.group);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, group: GroupId) -> Result<(), PersistError> {
        match fs::remove_file(self.path_for(group)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn load_all(&self) -> Result<Vec<Session>, PersistError> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path)?;
            match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable snapshot"),
            }
        }
        sessions.sort_by_key(|s| s.group);
        Ok(sessions)
    }
}

/// Keeps serialized snapshots in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshots {
    inner: Mutex<BTreeMap<GroupId, String>>,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, group: GroupId) -> Option<Session> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .get(&group)
            .and_then(|json| serde_json::from_str(json).ok())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSink for MemorySnapshots {
    fn save(&self, session: &Session) -> Result<(), PersistError> {
        let json = serde_json::to_string(session)?;
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.group, json);
        Ok(())
    }

    fn remove(&self, group: GroupId) -> Result<(), PersistError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&group);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Session>, PersistError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .values()
            .map(|json| serde_json::from_str(json).map_err(PersistError::from))
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshots;

impl SnapshotSink for NoSnapshots {
    fn save(&self, _session: &Session) -> Result<(), PersistError> {
        Ok(())
    }

    fn remove(&self, _group: GroupId) -> Result<(), PersistError> {
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Session>, PersistError> {
        Ok(Vec::new())
    }
}
