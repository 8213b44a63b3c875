//! Shared test utilities for the catalog test suite.
//!
//! Provides synthetic image payloads, a catalog seeded with two makes and a
//! feature, and a manually driven clock so timestamp assertions are exact.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (catalog, seed) = seeded_catalog();
//! let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
//!
//! seed.clock.advance(Duration::hours(1));
//! let published = catalog.set_car_status(car.id, CarStatus::Published).unwrap();
//! assert_eq!(published.published_at, Some(seed.clock.now()));
//! ```

use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use rust_decimal::Decimal;

use crate::clock::{Clock, ManualClock};
use crate::media::{MediaError, MediaStore, MemoryMediaStore};
use crate::store::Catalog;
use crate::types::{CarAttributes, CarModelId, FeatureCategoryId, FeatureId, MakeId, PayloadRef};

// =========================================================================
// Synthetic images
// =========================================================================

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// A gradient RGB JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// A half-transparent RGBA PNG.
pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        image::Rgba([200, 30, 30, if x % 2 == 0 { 255 } else { 64 }])
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// An 8-bit grayscale PNG.
pub fn gray_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| image::Luma([((x + y) % 256) as u8]));
    encode(DynamicImage::ImageLuma8(img), ImageFormat::Png)
}

/// A JPEG whose EXIF block carries the given orientation tag (1-8).
///
/// The APP1 segment is spliced in right after SOI: a little-endian TIFF
/// header followed by a single-entry IFD holding tag 0x0112.
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
    let plain = jpeg_bytes(width, height);
    assert_eq!(&plain[..2], &[0xFF, 0xD8], "encoder must emit SOI first");

    #[rustfmt::skip]
    let app1: [u8; 36] = [
        0xFF, 0xE1, 0x00, 0x22,                         // APP1, length 34
        b'E', b'x', b'i', b'f', 0x00, 0x00,             // Exif\0\0
        b'I', b'I', 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, // TIFF header, IFD at 8
        0x01, 0x00,                                     // one entry
        0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, // Orientation, SHORT, 1
        orientation, 0x00, 0x00, 0x00,                  // value
        0x00, 0x00, 0x00, 0x00,                         // no next IFD
    ];

    let mut out = Vec::with_capacity(plain.len() + app1.len());
    out.extend_from_slice(&plain[..2]);
    out.extend_from_slice(&app1);
    out.extend_from_slice(&plain[2..]);
    out
}

// =========================================================================
// Seeded catalog
// =========================================================================

/// Ids created by [`seeded_catalog`].
pub struct Seed {
    pub audi: MakeId,
    pub bmw: MakeId,
    pub a4: CarModelId,
    pub x5: CarModelId,
    pub comfort: FeatureCategoryId,
    pub heated_seats: FeatureId,
    pub clock: Arc<ManualClock>,
}

/// In-memory catalog with Audi A4, BMW X5 and a "Comfort / Heated seats"
/// feature, driven by a manual clock starting at 2024-05-01 12:00 UTC.
pub fn seeded_catalog() -> (Catalog, Seed) {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let catalog = Catalog::in_memory().with_clock(Arc::clone(&clock));

    let audi = catalog.create_make("Audi", None).unwrap();
    let bmw = catalog.create_make("BMW", None).unwrap();
    let a4 = catalog.create_car_model(audi.id, "A4", None).unwrap();
    let x5 = catalog.create_car_model(bmw.id, "X5", None).unwrap();
    let comfort = catalog.create_feature_category("Comfort", None).unwrap();
    let heated_seats = catalog
        .create_feature(comfort.id, "Heated seats", None)
        .unwrap();

    let seed = Seed {
        audi: audi.id,
        bmw: bmw.id,
        a4: a4.id,
        x5: x5.id,
        comfort: comfort.id,
        heated_seats: heated_seats.id,
        clock,
    };
    (catalog, seed)
}

/// A valid draft-status Audi A4 listing without a VIN.
pub fn car_attributes(seed: &Seed) -> CarAttributes {
    let mut attrs = CarAttributes::new("Audi A4 2.0 TDI", seed.audi, seed.a4, 2019, Decimal::new(25_000, 0));
    attrs.mileage_km = 98_000;
    attrs.transmission = "automatic".into();
    attrs.contact_name = "Ivan".into();
    attrs.contact_phone = "+375291234567".into();
    attrs
}

// =========================================================================
// Interleaving control
// =========================================================================

/// Parks the next caller of [`Gate::pass`] until the test lets it go.
#[derive(Default)]
pub struct Gate {
    armed: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl Gate {
    /// Arm the gate for one caller. Returns a receiver that fires once the
    /// caller is parked, and the sender that releases it.
    pub fn arm(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.armed.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    pub fn pass(&self) {
        let armed = self.armed.lock().unwrap().take();
        if let Some((entered, release)) = armed {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
    }
}

/// A clock that ticks one second per reading; a reading can be parked on
/// its gate after the time was taken.
pub struct SteppingClock {
    now: Mutex<DateTime<Utc>>,
    pub gate: Gate,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            gate: Gate::default(),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let reading = {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(1);
            *now
        };
        self.gate.pass();
        reading
    }
}

/// In-memory media whose deletes can be parked on a gate.
#[derive(Default)]
pub struct GatedMedia {
    inner: MemoryMediaStore,
    pub deletes: Gate,
}

impl MediaStore for GatedMedia {
    fn put(
        &self,
        file_name: &str,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<PayloadRef, MediaError> {
        self.inner.put(file_name, bytes, at)
    }

    fn get(&self, payload: &PayloadRef) -> Result<Vec<u8>, MediaError> {
        self.inner.get(payload)
    }

    fn contains(&self, payload: &PayloadRef) -> bool {
        self.inner.contains(payload)
    }

    fn delete(&self, payload: &PayloadRef) -> Result<(), MediaError> {
        self.deletes.pass();
        self.inner.delete(payload)
    }
}
