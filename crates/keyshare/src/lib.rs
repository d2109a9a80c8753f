//! Storage for the key share produced by a keygen or reshare round.
//!
//! A [`KeyshareStore`] owns one JSON file. Keygen and reshare take the store's
//! lock through [`KeyshareStore::lock`] for the whole round, so signing
//! processes calling [`KeyshareStore::load`] wait until the new share has been
//! written. The lock is released when the [`KeyshareGuard`] is dropped, on every
//! path.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum KeyshareError {
    #[error("keyshare file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keyshare file {path} is not valid json: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = KeyshareError> = std::result::Result<T, E>;

/// Key material of this party together with the committee it signs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Keyshare<K> {
    pub key: K,
    pub threshold: usize,
    pub peers: Vec<String>,
}

impl<K> Keyshare<K> {
    pub const fn new(key: K, threshold: usize, peers: Vec<String>) -> Self {
        Self {
            key,
            threshold,
            peers,
        }
    }
}

#[derive(Debug)]
pub struct KeyshareStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl KeyshareStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until no other keygen, reshare or read holds the store.
    pub fn lock(&self) -> KeyshareGuard<'_> {
        KeyshareGuard {
            path: &self.path,
            _guard: self.lock.lock(),
        }
    }

    /// Reads the current share. Waits while a keygen or reshare holds the lock.
    pub fn load<K: DeserializeOwned>(&self) -> Result<Keyshare<K>> {
        self.lock().load()
    }
}

/// Exclusive access to a [`KeyshareStore`], released on drop.
#[derive(Debug)]
pub struct KeyshareGuard<'a> {
    path: &'a Path,
    _guard: MutexGuard<'a, ()>,
}

impl KeyshareGuard<'_> {
    fn io_error(&self, source: std::io::Error) -> KeyshareError {
        KeyshareError::Io {
            path: self.path.to_path_buf(),
            source,
        }
    }

    /// Replaces the stored share.
    ///
    /// The share is written to a temporary file next to the target and renamed
    /// over it, so readers never observe a partially written file.
    pub fn store<K: Serialize>(&self, keyshare: &Keyshare<K>) -> Result<()> {
        let encoded = serde_json::to_vec(keyshare).map_err(|source| KeyshareError::Json {
            path: self.path.to_path_buf(),
            source,
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        file.write_all(&encoded).map_err(|e| self.io_error(e))?;
        file.as_file().sync_all().map_err(|e| self.io_error(e))?;
        file.persist(self.path).map_err(|e| self.io_error(e.error))?;

        debug!(
            path = %self.path.display(),
            threshold = keyshare.threshold,
            peers = keyshare.peers.len(),
            "keyshare stored"
        );
        Ok(())
    }

    pub fn load<K: DeserializeOwned>(&self) -> Result<Keyshare<K>> {
        let contents = std::fs::read(self.path).map_err(|e| self.io_error(e))?;
        serde_json::from_slice(&contents).map_err(|source| KeyshareError::Json {
            path: self.path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, mpsc},
        thread,
        time::Duration,
    };

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct TestKey {
        share: String,
        index: u16,
    }

    fn keyshare(threshold: usize) -> Keyshare<TestKey> {
        Keyshare::new(
            TestKey {
                share: "0xabc".to_string(),
                index: 1,
            },
            threshold,
            vec!["QmPeerA".to_string(), "QmPeerB".to_string()],
        )
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyshareStore::new(dir.path().join("keyshare.json"));

        store.lock().store(&keyshare(1)).unwrap();
        assert_eq!(store.load::<TestKey>().unwrap(), keyshare(1));
    }

    #[test]
    fn store_replaces_previous_share() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyshareStore::new(dir.path().join("keyshare.json"));

        {
            let guard = store.lock();
            guard.store(&keyshare(3)).unwrap();
            guard.store(&keyshare(1)).unwrap();
        }
        assert_eq!(store.load::<TestKey>().unwrap().threshold, 1);

        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1, "temporary files must not be left behind");
    }

    #[test]
    fn file_uses_committee_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyshare.json");
        let store = KeyshareStore::new(&path);
        store.lock().store(&keyshare(2)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["Threshold"], 2);
        assert_eq!(raw["Peers"][1], "QmPeerB");
        assert_eq!(raw["Key"]["index"], 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyshareStore::new(dir.path().join("absent.json"));
        assert!(matches!(
            store.load::<TestKey>(),
            Err(KeyshareError::Io { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyshare.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = KeyshareStore::new(path);
        assert!(matches!(
            store.load::<TestKey>(),
            Err(KeyshareError::Json { .. })
        ));
    }

    #[test]
    fn load_waits_for_locked_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KeyshareStore::new(dir.path().join("keyshare.json")));
        store.lock().store(&keyshare(1)).unwrap();

        let guard = store.lock();
        let (tx, rx) = mpsc::channel();
        let reader = {
            let store = store.clone();
            thread::spawn(move || {
                let loaded = store.load::<TestKey>().unwrap();
                tx.send(loaded.threshold).unwrap();
            })
        };

        assert!(
            rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "read must block while the round holds the lock"
        );
        guard.store(&keyshare(5)).unwrap();
        drop(guard);

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 5);
        reader.join().unwrap();
    }
}
