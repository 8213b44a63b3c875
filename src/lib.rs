//! # Car Catalog
//!
//! Back office for a used-car dealership: makes and models, car listings
//! with their photos, and a log of submissions to external marketplaces.
//!
//! # Architecture: Two Write Paths
//!
//! Almost every rule of the catalog lives on one of two operations:
//!
//! ```text
//! save_car        draft  →  validate → slug → published_at → status_changed_at → persist
//! save_car_image  upload →  normalise → store payload → persist row → clear sibling primaries
//! ```
//!
//! Both run their read-then-write decisions inside a single critical section
//! on the [`Catalog`], so concurrent callers can never lose a status
//! transition or end up with two primary photos.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | The [`Catalog`] itself: entity tables, id sequences, JSON snapshot persistence |
//! | [`cars`] | Car state manager: validation, slug assignment, status and publication timestamps |
//! | [`images`] | Photo uploads, the single-primary rule, nested-form sync, directory import |
//! | [`lookups`] | Makes, models, feature categories and features |
//! | [`publication`] | Marketplace channels and the append-only submission log |
//! | [`imaging`] | Pure-Rust upload normalisation: EXIF orientation, colour, downscale, JPEG |
//! | [`media`] | Content-addressed storage for normalised payloads |
//! | [`config`] | `catalog.toml` loading, validation and merging over stock defaults |
//! | [`types`] | Entities and their ids, serialized into the snapshot |
//! | [`slug`] | Transliterating slug generator |
//! | [`naming`] | Output file names for normalised photos |
//! | [`clock`] | Time source, swappable for a manual clock in tests |
//! | [`error`] | [`CatalogError`] |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Normalise Once, On Upload
//!
//! Uploads arrive from phones and cameras in every format, orientation and
//! size. Each one is decoded, turned upright, converted to RGB (or kept as
//! 8-bit gray), bounded to 2560px on its longest side and re-encoded as JPEG
//! before it is stored. Everything downstream (listing pages, marketplace
//! feeds) can then assume one predictable format. Already-stored payloads
//! are never re-optimised.
//!
//! ## The Store Is Authoritative
//!
//! Callers may pass the record they loaded earlier, but the previous status
//! used for `status_changed_at` is always read from the store at write time.
//!
//! ## One Snapshot File
//!
//! The catalog state is a single pretty-printed JSON document. It is small,
//! diffable and trivially backed up; id sequences are saved alongside the
//! rows so ids are never reused across restarts.

pub mod cars;
pub mod clock;
pub mod config;
pub mod error;
pub mod images;
pub mod imaging;
pub mod lookups;
pub mod media;
pub mod naming;
pub mod output;
pub mod publication;
pub mod slug;
pub mod store;
pub mod types;

pub use cars::{CarDraft, CarField, FieldSet};
pub use error::CatalogError;
pub use images::{CarImageUpload, ImagePayload};
pub use publication::{NewChannel, PublicationAttempt, PublicationLogFilter};
pub use store::Catalog;

#[cfg(test)]
pub(crate) mod test_helpers;
