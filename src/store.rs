//! The catalog store: entity tables, id sequences and persistence.
//!
//! All entities live in one [`CatalogState`] behind a single mutex. Every
//! operation that reads a row and then writes based on what it read (the
//! previous-status comparison, clearing sibling primary flags, uniqueness and
//! protect-on-delete checks) runs inside one critical section, which gives
//! the same guarantee as a row lock without any retry logic.
//!
//! # Identifiers
//!
//! Each entity type has its own monotonically increasing sequence starting at
//! 1. Ids are never reused, even after a delete, and the counters are saved
//! with the snapshot so a reload continues where it left off.
//!
//! # Snapshot file
//!
//! [`Catalog::persist`] writes the whole state as pretty JSON next to a
//! version number. Writes go to a temporary file first and are renamed into
//! place so a crash never leaves a half-written snapshot behind.

use crate::clock::{Clock, SystemClock};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::imaging::NormaliseParams;
use crate::media::{FsMediaStore, MediaStore, MemoryMediaStore};
use crate::types::{
    Car, CarId, CarImage, CarImageId, CarModel, CarModelId, ChannelId, Feature,
    FeatureCategory, FeatureCategoryId, FeatureId, Make, MakeId, PublicationChannel,
    PublicationLog, PublicationLogId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Version of the snapshot format. Bump when the layout changes incompatibly.
const SNAPSHOT_VERSION: u32 = 1;

/// Last id handed out per entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Sequences {
    pub make: u64,
    pub car_model: u64,
    pub feature_category: u64,
    pub feature: u64,
    pub car: u64,
    pub car_image: u64,
    pub channel: u64,
    pub publication_log: u64,
}

/// Advance a sequence counter and return the new value.
pub(crate) fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// Every table of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CatalogState {
    pub version: u32,
    #[serde(default)]
    pub sequences: Sequences,
    #[serde(default)]
    pub makes: BTreeMap<MakeId, Make>,
    #[serde(default)]
    pub car_models: BTreeMap<CarModelId, CarModel>,
    #[serde(default)]
    pub feature_categories: BTreeMap<FeatureCategoryId, FeatureCategory>,
    #[serde(default)]
    pub features: BTreeMap<FeatureId, Feature>,
    #[serde(default)]
    pub cars: BTreeMap<CarId, Car>,
    #[serde(default)]
    pub car_images: BTreeMap<CarImageId, CarImage>,
    #[serde(default)]
    pub channels: BTreeMap<ChannelId, PublicationChannel>,
    #[serde(default)]
    pub publication_logs: BTreeMap<PublicationLogId, PublicationLog>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            sequences: Sequences::default(),
            makes: BTreeMap::new(),
            car_models: BTreeMap::new(),
            feature_categories: BTreeMap::new(),
            features: BTreeMap::new(),
            cars: BTreeMap::new(),
            car_images: BTreeMap::new(),
            channels: BTreeMap::new(),
            publication_logs: BTreeMap::new(),
        }
    }
}

impl CatalogState {
    /// Parse a snapshot, refusing files written by another format version.
    pub fn from_json(content: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(content)?;
        if state.version != SNAPSHOT_VERSION {
            return Err(CatalogError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "snapshot version {} is not supported (expected {})",
                    state.version, SNAPSHOT_VERSION
                ),
            )));
        }
        Ok(state)
    }

    pub fn make(&self, id: MakeId) -> Result<&Make> {
        self.makes
            .get(&id)
            .ok_or_else(|| CatalogError::not_found("make", id))
    }

    pub fn car_model(&self, id: CarModelId) -> Result<&CarModel> {
        self.car_models
            .get(&id)
            .ok_or_else(|| CatalogError::not_found("car model", id))
    }

    pub fn car(&self, id: CarId) -> Result<&Car> {
        self.cars
            .get(&id)
            .ok_or_else(|| CatalogError::not_found("car", id))
    }

    pub fn channel(&self, id: ChannelId) -> Result<&PublicationChannel> {
        self.channels
            .get(&id)
            .ok_or_else(|| CatalogError::not_found("publication channel", id))
    }

    /// Images of one car in display order: `(ordering, id)`.
    pub fn images_of(&self, car: CarId) -> Vec<&CarImage> {
        let mut images: Vec<&CarImage> = self
            .car_images
            .values()
            .filter(|img| img.car == car)
            .collect();
        images.sort_by_key(|img| (img.ordering, img.id));
        images
    }
}

/// The catalog: entity tables plus the collaborators operations need.
///
/// `Catalog` is `Send + Sync`; share it behind an `Arc` between request
/// handlers.
pub struct Catalog {
    state: Mutex<CatalogState>,
    pub(crate) media: Box<dyn MediaStore>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) params: NormaliseParams,
    data_file: Option<PathBuf>,
}

impl Catalog {
    /// Empty catalog with in-memory media and the wall clock.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
            media: Box::new(MemoryMediaStore::new()),
            clock: Box::new(SystemClock),
            params: NormaliseParams::default(),
            data_file: None,
        }
    }

    /// Open the catalog described by `config`.
    ///
    /// Loads the snapshot from `storage.data_file` if it exists (an absent
    /// file is an empty catalog) and stores photos under `storage.media_root`.
    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let data_file = config.storage.data_file.clone();
        let state = match std::fs::read_to_string(&data_file) {
            Ok(content) => CatalogState::from_json(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CatalogState::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            data_file = %data_file.display(),
            cars = state.cars.len(),
            images = state.car_images.len(),
            "opened catalog"
        );
        Ok(Self {
            state: Mutex::new(state),
            media: Box::new(FsMediaStore::new(&config.storage.media_root)),
            clock: Box::new(SystemClock),
            params: config.images.normalise_params(),
            data_file: Some(data_file),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_media(mut self, media: impl MediaStore + 'static) -> Self {
        self.media = Box::new(media);
        self
    }

    pub fn with_params(mut self, params: NormaliseParams) -> Self {
        self.params = params;
        self
    }

    pub fn media(&self) -> &dyn MediaStore {
        self.media.as_ref()
    }

    pub fn normalise_params(&self) -> NormaliseParams {
        self.params
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    /// Enter the critical section. A panic in another holder does not make
    /// the data unusable: each operation validates before it mutates.
    pub(crate) fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize the current state as JSON.
    pub fn snapshot_json(&self) -> Result<String> {
        let state = self.lock();
        Ok(serde_json::to_string_pretty(&*state)?)
    }

    /// Write the snapshot to the configured data file. In-memory catalogs
    /// have nowhere to write and return `Ok(false)`.
    pub fn persist(&self) -> Result<bool> {
        let Some(path) = &self.data_file else {
            return Ok(false);
        };
        let json = self.snapshot_json()?;
        write_atomically(path, json.as_bytes())?;
        debug!(data_file = %path.display(), bytes = json.len(), "persisted catalog");
        Ok(true)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}
