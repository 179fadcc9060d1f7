//! Private key material lookup.
//!
//! The resolver never checks the filesystem itself; it asks a
//! [`KeyMaterialStore`]. Production uses [`FsKeyStore`], tests use
//! [`MemoryKeyStore`].

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Where private keys for provider key pairs live.
pub trait KeyMaterialStore: Send + Sync {
    /// Returns true if the private key for `key_name` is available.
    fn has_private_key(&self, key_name: &str) -> bool;

    /// Persist the private key returned when a key pair is created.
    fn store_private_key(&self, key_name: &str, material: &str) -> std::io::Result<()>;
}

/// Keys stored as `<dir>/<key_name>.pem`.
#[derive(Debug, Clone)]
pub struct FsKeyStore {
    dir: PathBuf,
}

impl FsKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the private key file for `key_name`.
    pub fn key_path(&self, key_name: &str) -> PathBuf {
        self.dir.join(format!("{key_name}.pem"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyMaterialStore for FsKeyStore {
    fn has_private_key(&self, key_name: &str) -> bool {
        self.key_path(key_name).is_file()
    }

    fn store_private_key(&self, key_name: &str, material: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key_name);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            file.write_all(material.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            let mut file = std::fs::File::create(&path)?;
            file.write_all(material.as_bytes())?;
        }

        debug!(path = %path.display(), "Stored private key");
        Ok(())
    }
}

/// In-memory key store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing keys.
    pub fn with_keys<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = names
            .into_iter()
            .map(|n| (n.into(), String::new()))
            .collect();
        Self {
            keys: Mutex::new(keys),
        }
    }

    /// The stored material for a key, if any.
    pub fn material(&self, key_name: &str) -> Option<String> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key_name)
            .cloned()
    }
}

impl KeyMaterialStore for MemoryKeyStore {
    fn has_private_key(&self, key_name: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key_name)
    }

    fn store_private_key(&self, key_name: &str, material: &str) -> std::io::Result<()> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key_name.to_string(), material.to_string());
        Ok(())
    }
}
