//! Storage for normalised photo payloads.
//!
//! The catalog keeps only a [`PayloadRef`] on each image row; the bytes live
//! in a [`MediaStore`]. Payloads are laid out by upload date and made unique
//! with a short content hash, so two `front.jpg` uploads never collide:
//!
//! ```text
//! media/
//! └── cars/
//!     └── 2024/05/01/
//!         ├── front-3f9a1c2b.jpg
//!         └── front-77d0e4aa.jpg
//! ```
//!
//! [`FsMediaStore`] writes under a root directory; [`MemoryMediaStore`] keeps
//! everything in a map for tests and dry runs.

use crate::naming::file_stem;
use crate::types::PayloadRef;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Top-level directory for car photos inside a media root.
const CAR_PREFIX: &str = "cars";

/// Hex characters of the content hash appended to each stored name.
const HASH_SUFFIX_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Payload not found: {0}")]
    NotFound(PayloadRef),
    #[error("Invalid payload reference: {0}")]
    InvalidRef(String),
}

/// Where normalised payloads are written and read back.
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under a name derived from `file_name` and return its reference.
    fn put(
        &self,
        file_name: &str,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<PayloadRef, MediaError>;

    fn get(&self, payload: &PayloadRef) -> Result<Vec<u8>, MediaError>;

    fn contains(&self, payload: &PayloadRef) -> bool;

    /// Remove a payload. Removing a missing payload is not an error.
    fn delete(&self, payload: &PayloadRef) -> Result<(), MediaError>;
}

/// SHA-256 of a payload, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Storage key for a payload: `cars/YYYY/MM/DD/<stem>-<hash8>.<ext>`.
pub fn payload_key(file_name: &str, bytes: &[u8], at: DateTime<Utc>) -> PayloadRef {
    let stem = file_stem(file_name);
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && !ext.contains(['/', '\\']))
        .unwrap_or(crate::naming::OUTPUT_EXTENSION);
    let hash = hash_bytes(bytes);
    PayloadRef(format!(
        "{}/{}/{}-{}.{}",
        CAR_PREFIX,
        at.format("%Y/%m/%d"),
        stem,
        &hash[..HASH_SUFFIX_LEN],
        ext
    ))
}

fn check_ref(payload: &PayloadRef) -> Result<(), MediaError> {
    let key = payload.0.as_str();
    let traverses = key
        .split(['/', '\\'])
        .any(|part| part.is_empty() || part == "." || part == "..");
    if traverses || key.starts_with('/') {
        return Err(MediaError::InvalidRef(key.to_string()));
    }
    Ok(())
}

/// Media store backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a payload.
    pub fn path_of(&self, payload: &PayloadRef) -> Result<PathBuf, MediaError> {
        check_ref(payload)?;
        Ok(self.root.join(&payload.0))
    }
}

impl MediaStore for FsMediaStore {
    fn put(
        &self,
        file_name: &str,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<PayloadRef, MediaError> {
        let payload = payload_key(file_name, bytes, at);
        let path = self.path_of(&payload)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        tracing::debug!(payload = %payload, len = bytes.len(), "stored payload");
        Ok(payload)
    }

    fn get(&self, payload: &PayloadRef) -> Result<Vec<u8>, MediaError> {
        let path = self.path_of(payload)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::NotFound(payload.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, payload: &PayloadRef) -> bool {
        self.path_of(payload).is_ok_and(|path| path.is_file())
    }

    fn delete(&self, payload: &PayloadRef) -> Result<(), MediaError> {
        let path = self.path_of(payload)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Media store that keeps payloads in memory.
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    blobs: Mutex<BTreeMap<PayloadRef, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaStore for MemoryMediaStore {
    fn put(
        &self,
        file_name: &str,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<PayloadRef, MediaError> {
        let payload = payload_key(file_name, bytes, at);
        check_ref(&payload)?;
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(payload.clone(), bytes.to_vec());
        Ok(payload)
    }

    fn get(&self, payload: &PayloadRef) -> Result<Vec<u8>, MediaError> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(payload)
            .cloned()
            .ok_or_else(|| MediaError::NotFound(payload.clone()))
    }

    fn contains(&self, payload: &PayloadRef) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(payload)
    }

    fn delete(&self, payload: &PayloadRef) -> Result<(), MediaError> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(payload);
        Ok(())
    }
}

impl<M: MediaStore + ?Sized> MediaStore for std::sync::Arc<M> {
    fn put(
        &self,
        file_name: &str,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<PayloadRef, MediaError> {
        (**self).put(file_name, bytes, at)
    }

    fn get(&self, payload: &PayloadRef) -> Result<Vec<u8>, MediaError> {
        (**self).get(payload)
    }

    fn contains(&self, payload: &PayloadRef) -> bool {
        (**self).contains(payload)
    }

    fn delete(&self, payload: &PayloadRef) -> Result<(), MediaError> {
        (**self).delete(payload)
    }
}
