//! Device identity.
//!
//! Each product area keeps one identifier per profile, generated on first use
//! and reused for every later session. Storage is injected through the
//! [`KeyValueStore`] trait so the lookup-or-generate logic is testable without
//! touching the filesystem.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde::{Deserialize, Serialize};

use crate::{env::Environment, error::StoreError};

/// Stable per-profile device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Product area a device identifier is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductArea {
    /// Open chat channels.
    Chat,
    /// Ticket-bound support sessions.
    Support,
}

impl ProductArea {
    /// Storage key holding this area's device identifier.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Chat => "chat-device-id",
            Self::Support => "support-device-id",
        }
    }
}

/// Minimal string key-value persistence.
pub trait KeyValueStore: Send + Sync {
    /// Look up a key.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or replace a key.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Return the device identifier for `area`, generating and persisting a new
/// UUID v4 the first time.
pub fn device_id<S, E>(store: &S, area: ProductArea, env: &E) -> Result<DeviceId, StoreError>
where
    S: KeyValueStore + ?Sized,
    E: Environment,
{
    let key = area.storage_key();

    if let Some(existing) = store.get(key)? {
        if !existing.trim().is_empty() {
            return Ok(DeviceId(existing));
        }
    }

    let uuid = uuid::Builder::from_random_bytes(env.random_u128().to_be_bytes()).into_uuid();
    let id = uuid.hyphenated().to_string();
    store.set(key, &id)?;

    tracing::info!(key, device_id = %id, "generated new device id");

    Ok(DeviceId(id))
}

/// In-memory store for tests and ephemeral profiles.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed store holding a CBOR-encoded map.
///
/// The file is created on first write. Writes go to a sibling temp file that
/// is then renamed over the original.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    /// Open a store at `path`. Nothing is read until the first lookup.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: RwLock::new(()) }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        ciborium::from_reader(bytes.as_slice())
            .map_err(|e| StoreError::Corrupt { reason: e.to_string() })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        ciborium::into_writer(entries, &mut buf)
            .map_err(|e| StoreError::Corrupt { reason: e.to_string() })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.read().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }
}
