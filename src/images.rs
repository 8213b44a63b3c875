//! Car photos: upload, primary flag and nested-form sync.
//!
//! An upload goes through two phases:
//!
//! 1. **Normalise** the raw bytes (no lock held; decoding is the slow part)
//! 2. **Commit**: store the payload, write the row and clear the flag on
//!    sibling primaries, in one critical section
//!
//! Readers therefore never see two primaries of one car, and a payload is
//! never stored and released concurrently under the same content key.

use crate::error::{CatalogError, Result};
use crate::imaging::{
    ImageBackend, NormaliseParams, NormalisedImage, RustBackend, normalise, normalise_batch,
    supported_input_extensions,
};
use crate::store::{Catalog, CatalogState, bump};
use crate::types::{CarId, CarImage, CarImageId, PayloadRef};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Where an image's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Freshly uploaded bytes; normalised before they are stored.
    Upload { bytes: Vec<u8>, file_name: String },
    /// The payload already attached to the image, kept untouched.
    Existing(PayloadRef),
}

/// Input for [`Catalog::save_car_image`]. `id: None` creates a new image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarImageUpload {
    pub id: Option<CarImageId>,
    pub car: CarId,
    pub payload: ImagePayload,
    pub caption: String,
    pub is_primary: bool,
    pub ordering: u16,
}

impl CarImageUpload {
    pub fn new(car: CarId, bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            id: None,
            car,
            payload: ImagePayload::Upload {
                bytes,
                file_name: file_name.into(),
            },
            caption: String::new(),
            is_primary: false,
            ordering: 0,
        }
    }

    /// Edit of a stored image that keeps its payload.
    pub fn existing(image: &CarImage) -> Self {
        Self {
            id: Some(image.id),
            car: image.car,
            payload: ImagePayload::Existing(image.payload.clone()),
            caption: image.caption.clone(),
            is_primary: image.is_primary,
            ordering: image.ordering,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn with_ordering(mut self, ordering: u16) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }
}

/// Row fields of an upload, split from its payload.
struct ImageRow {
    id: Option<CarImageId>,
    car: CarId,
    caption: String,
    is_primary: bool,
    ordering: u16,
}

enum Source {
    Fresh(NormalisedImage),
    Existing(PayloadRef),
}

fn split(upload: CarImageUpload) -> (ImageRow, ImagePayload) {
    let row = ImageRow {
        id: upload.id,
        car: upload.car,
        caption: upload.caption,
        is_primary: upload.is_primary,
        ordering: upload.ordering,
    };
    (row, upload.payload)
}

/// Insert or replace the row. Returns the row and the payload it replaced.
fn write_image_row(
    state: &mut CatalogState,
    row: ImageRow,
    payload: &PayloadRef,
    fresh: bool,
    now: DateTime<Utc>,
) -> Result<(CarImage, Option<PayloadRef>)> {
    if !state.cars.contains_key(&row.car) {
        return Err(CatalogError::constraint(format!(
            "car {} does not exist",
            row.car
        )));
    }
    let stored = match row.id {
        Some(id) => {
            let stored = state
                .car_images
                .get(&id)
                .ok_or_else(|| CatalogError::not_found("car image", id))?;
            if stored.car != row.car {
                return Err(CatalogError::validation(
                    "car",
                    format!("image {id} belongs to car {}", stored.car),
                ));
            }
            Some(stored.clone())
        }
        None => None,
    };
    if !fresh && stored.as_ref().is_none_or(|s| &s.payload != payload) {
        return Err(CatalogError::validation(
            "payload",
            format!("{payload} is not the payload of this image"),
        ));
    }
    let id = match &stored {
        Some(stored) => stored.id,
        None => CarImageId(bump(&mut state.sequences.car_image)),
    };
    let image = CarImage {
        id,
        car: row.car,
        payload: payload.clone(),
        caption: row.caption,
        is_primary: row.is_primary,
        ordering: row.ordering,
        created_at: stored.as_ref().map_or(now, |s| s.created_at),
        updated_at: now,
    };
    state.car_images.insert(image.id, image.clone());
    Ok((image, stored.map(|s| s.payload)))
}

/// Clear `is_primary` on the other images of `car` while `keep` is still
/// primary. Touches no other field.
fn clear_siblings(state: &mut CatalogState, car: CarId, keep: CarImageId) -> usize {
    let kept_primary = state
        .car_images
        .get(&keep)
        .is_some_and(|img| img.car == car && img.is_primary);
    if !kept_primary {
        debug!(image = %keep, "image is no longer primary, leaving siblings alone");
        return 0;
    }
    let mut cleared = 0;
    for image in state.car_images.values_mut() {
        if image.car == car && image.id != keep && image.is_primary {
            image.is_primary = false;
            cleared += 1;
        }
    }
    if cleared > 0 {
        debug!(cleared, "cleared sibling primary flags");
    }
    cleared
}

fn prepare(
    backend: &impl ImageBackend,
    payload: ImagePayload,
    params: &NormaliseParams,
) -> Result<Source> {
    match payload {
        ImagePayload::Upload { bytes, file_name } => {
            Ok(Source::Fresh(normalise(backend, &bytes, &file_name, params)?))
        }
        ImagePayload::Existing(payload) => Ok(Source::Existing(payload)),
    }
}

impl Catalog {
    /// Save one image using the built-in decoder.
    pub fn save_car_image(&self, upload: CarImageUpload) -> Result<CarImage> {
        self.save_car_image_with(&RustBackend::new(), upload)
    }

    #[instrument(skip_all, fields(car = %upload.car, image = ?upload.id))]
    pub fn save_car_image_with(
        &self,
        backend: &impl ImageBackend,
        upload: CarImageUpload,
    ) -> Result<CarImage> {
        self.ensure_car(upload.car)?;
        let (row, payload) = split(upload);
        let source = prepare(backend, payload, &self.params)
            .inspect_err(|e| warn!(error = %e, "rejected image upload"))?;
        self.commit_image(row, source)
    }

    /// Delete a payload from the media store unless a row still points at
    /// it. Identical uploads share one content-addressed payload, so the
    /// check and the delete run under the caller's guard, the same one
    /// [`commit_image`](Self::commit_image) holds while it stores a payload.
    pub(crate) fn release_payload(
        &self,
        state: &CatalogState,
        payload: &PayloadRef,
    ) -> Result<()> {
        if !state.car_images.values().any(|img| &img.payload == payload) {
            self.media.delete(payload)?;
        }
        Ok(())
    }

    fn ensure_car(&self, car: CarId) -> Result<()> {
        if self.lock().cars.contains_key(&car) {
            Ok(())
        } else {
            Err(CatalogError::constraint(format!("car {car} does not exist")))
        }
    }

    /// Store the payload (if new), write the row and settle the primary flag,
    /// all in one critical section.
    fn commit_image(&self, row: ImageRow, source: Source) -> Result<CarImage> {
        let mut state = self.lock();
        let now = self.clock.now();
        let (payload, fresh) = match source {
            Source::Fresh(image) => (self.media.put(&image.file_name, &image.bytes, now)?, true),
            Source::Existing(payload) => (payload, false),
        };

        let (image, replaced) = match write_image_row(&mut state, row, &payload, fresh, now) {
            Ok(written) => written,
            Err(e) => {
                if fresh {
                    self.release_payload(&state, &payload)?;
                }
                return Err(e);
            }
        };
        if let Some(old) = replaced
            && old != image.payload
        {
            self.release_payload(&state, &old)?;
        }
        if image.is_primary {
            clear_siblings(&mut state, image.car, image.id);
        }
        info!(image = %image.id, car = %image.car, payload = %image.payload, "saved car image");
        Ok(image)
    }

    /// Clear `is_primary` on every other image of `car`, but only while
    /// `keep` is still primary. Returns how many flags were cleared.
    ///
    /// Saves and [`set_primary_image`](Self::set_primary_image) already do
    /// this inside their own critical section.
    #[instrument(skip(self))]
    pub fn clear_sibling_primaries(&self, car: CarId, keep: CarImageId) -> Result<usize> {
        let mut state = self.lock();
        if !state.car_images.contains_key(&keep) {
            return Err(CatalogError::not_found("car image", keep));
        }
        Ok(clear_siblings(&mut state, car, keep))
    }

    /// Flag an existing image as the car's primary photo.
    #[instrument(skip(self))]
    pub fn set_primary_image(&self, id: CarImageId) -> Result<CarImage> {
        let mut state = self.lock();
        let now = self.clock.now();
        let image = state
            .car_images
            .get_mut(&id)
            .ok_or_else(|| CatalogError::not_found("car image", id))?;
        if !image.is_primary {
            image.is_primary = true;
            image.updated_at = now;
        }
        let image = image.clone();
        clear_siblings(&mut state, image.car, image.id);
        Ok(image)
    }

    /// Delete an image row and its stored payload.
    #[instrument(skip(self))]
    pub fn delete_car_image(&self, id: CarImageId) -> Result<()> {
        let mut state = self.lock();
        let removed = state
            .car_images
            .remove(&id)
            .ok_or_else(|| CatalogError::not_found("car image", id))?;
        self.release_payload(&state, &removed.payload)?;
        info!(image = %id, car = %removed.car, "deleted car image");
        Ok(())
    }

    /// Make the car's images match `uploads`, like saving a nested form.
    ///
    /// Listed images are created or updated, the car's other images are
    /// deleted. All new payloads are normalised up front; if any fails
    /// nothing is written.
    pub fn sync_car_images(&self, car: CarId, uploads: Vec<CarImageUpload>) -> Result<Vec<CarImage>> {
        self.sync_car_images_with(&RustBackend::new(), car, uploads)
    }

    #[instrument(skip_all, fields(car = %car, uploads = uploads.len()))]
    pub fn sync_car_images_with(
        &self,
        backend: &(impl ImageBackend + Sync),
        car: CarId,
        uploads: Vec<CarImageUpload>,
    ) -> Result<Vec<CarImage>> {
        self.ensure_car(car)?;
        if let Some(stray) = uploads.iter().find(|u| u.car != car) {
            return Err(CatalogError::validation(
                "car",
                format!("upload for car {} in a sync of car {car}", stray.car),
            ));
        }

        let (rows, payloads): (Vec<ImageRow>, Vec<ImagePayload>) =
            uploads.into_iter().map(split).unzip();
        let params = self.params;
        let sources = payloads
            .into_par_iter()
            .map(|payload| prepare(backend, payload, &params))
            .collect::<Result<Vec<Source>>>()?;

        let mut saved = Vec::with_capacity(rows.len());
        for (row, source) in rows.into_iter().zip(sources) {
            saved.push(self.commit_image(row, source)?);
        }

        let keep: BTreeSet<CarImageId> = saved.iter().map(|img| img.id).collect();
        let mut state = self.lock();
        let doomed: Vec<CarImageId> = state
            .images_of(car)
            .iter()
            .map(|img| img.id)
            .filter(|id| !keep.contains(id))
            .collect();
        let dropped: Vec<CarImage> = doomed
            .iter()
            .filter_map(|id| state.car_images.remove(id))
            .collect();
        for image in &dropped {
            self.release_payload(&state, &image.payload)?;
        }
        info!(saved = saved.len(), deleted = dropped.len(), "synced car images");

        // rows may have lost their primary flag to a later upload in the batch
        Ok(saved
            .into_iter()
            .filter_map(|img| state.car_images.get(&img.id).cloned())
            .collect())
    }

    /// Import every supported photo under `dir`, in file-name order.
    ///
    /// The first imported photo becomes primary when the car has none yet.
    pub fn import_images(&self, car: CarId, dir: &Path) -> Result<Vec<CarImage>> {
        self.import_images_with(&RustBackend::new(), car, dir)
    }

    #[instrument(skip(self, backend))]
    pub fn import_images_with(
        &self,
        backend: &impl ImageBackend,
        car: CarId,
        dir: &Path,
    ) -> Result<Vec<CarImage>> {
        self.ensure_car(car)?;
        let files = photo_files(dir)?;
        let mut uploads = Vec::with_capacity(files.len());
        for path in &files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            uploads.push((std::fs::read(path)?, name));
        }
        let normalised = normalise_batch(backend, &uploads, &self.params)?;

        let existing = self.car_images(car)?;
        let needs_primary = !existing.iter().any(|img| img.is_primary);
        let mut next_ordering = existing
            .iter()
            .map(|img| img.ordering.saturating_add(1))
            .max()
            .unwrap_or(0);

        let mut imported = Vec::with_capacity(normalised.len());
        for (index, image) in normalised.into_iter().enumerate() {
            let row = ImageRow {
                id: None,
                car,
                caption: String::new(),
                is_primary: needs_primary && index == 0,
                ordering: next_ordering,
            };
            next_ordering = next_ordering.saturating_add(1);
            imported.push(self.commit_image(row, Source::Fresh(image))?);
        }
        info!(count = imported.len(), dir = %dir.display(), "imported car images");
        Ok(imported)
    }

    /// Images of `car` in display order.
    pub fn car_images(&self, car: CarId) -> Result<Vec<CarImage>> {
        let state = self.lock();
        state.car(car)?;
        Ok(state.images_of(car).into_iter().cloned().collect())
    }

    pub fn primary_image(&self, car: CarId) -> Result<Option<CarImage>> {
        Ok(self.car_images(car)?.into_iter().find(|img| img.is_primary))
    }

    pub fn get_car_image(&self, id: CarImageId) -> Result<CarImage> {
        self.lock()
            .car_images
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("car image", id))
    }
}

/// Supported photo files under `dir`, sorted by path.
fn photo_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let extensions = supported_input_extensions();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CatalogError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other(format!("cannot walk {}", dir.display()))
            }))
        })?;
        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()));
        if entry.file_type().is_file() && supported {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
