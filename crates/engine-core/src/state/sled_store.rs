use crate::{
    error::StateError,
    state::{CheckpointStore, models::StoredCheckpoint},
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::debug;

const OPEN_ATTEMPTS: u32 = 10;
const OPEN_BACKOFF: Duration = Duration::from_millis(50);

/// On-disk checkpoint store with one sled database per checkpoint key.
///
/// sled locks its directory for as long as a handle is open. Giving every
/// job identity its own database under `root` lets partitions run as
/// separate processes over one state directory. Reading the checkpoint of
/// a job that is still running fails with [`StateError::Locked`].
pub struct SledCheckpointStore {
    root: PathBuf,
    open: Mutex<HashMap<String, sled::Db>>,
}

impl SledCheckpointStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StateError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            open: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stored keys starting with `prefix`, sorted. Only reads directory
    /// names, so it works while jobs hold their databases.
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>, StateError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(key) = urlencoding::decode(&name) else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key.into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(urlencoding::encode(key).as_ref())
    }

    /// Handle for `key`, opened on first use and kept for the store's
    /// lifetime. `None` when nothing was stored and `create` is false.
    async fn db(&self, key: &str, create: bool) -> Result<Option<sled::Db>, StateError> {
        let mut open = self.open.lock().await;
        if let Some(db) = open.get(key) {
            return Ok(Some(db.clone()));
        }

        let path = self.path_for(key);
        if !create && !path.exists() {
            return Ok(None);
        }
        let db = open_with_retry(&path).await?;
        open.insert(key.to_string(), db.clone());
        Ok(Some(db))
    }
}

/// Opens a database, waiting briefly for a handle that is being released.
async fn open_with_retry(path: &Path) -> Result<sled::Db, StateError> {
    // Every `set` flushes, so no background flusher holds the lock.
    let config = sled::Config::new().path(path).flush_every_ms(None);

    let mut attempt = 1;
    loop {
        match config.open() {
            Ok(db) => return Ok(db),
            Err(err) if is_locked(&err) => {
                if attempt >= OPEN_ATTEMPTS {
                    return Err(StateError::Locked(path.display().to_string()));
                }
                debug!(path = %path.display(), attempt, "Checkpoint database locked, retrying");
                tokio::time::sleep(OPEN_BACKOFF).await;
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn is_locked(err: &sled::Error) -> bool {
    match err {
        sled::Error::Io(io) => {
            io.kind() == ErrorKind::WouldBlock || io.to_string().contains("could not acquire lock")
        }
        _ => false,
    }
}

#[async_trait]
impl CheckpointStore for SledCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let Some(db) = self.db(key, false).await? else {
            return Ok(None);
        };
        match db.get(key)? {
            Some(bytes) => {
                let entry: StoredCheckpoint = bincode::deserialize(&bytes)?;
                Ok(Some(entry.value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let Some(db) = self.db(key, true).await? else {
            return Err(StateError::Backend(format!("no database for '{key}'")));
        };
        let bytes = bincode::serialize(&StoredCheckpoint::now(value))?;
        db.insert(key, bytes)?;
        // Durable before the next batch starts.
        db.flush_async().await?;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StateError> {
        let mut entries = Vec::new();
        for key in self.keys(prefix)? {
            if let Some(value) = self.get(&key).await? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }
}
