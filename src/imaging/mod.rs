//! Image normalisation: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Orient** | EXIF orientation via `ImageDecoder::orientation` |
//! | **Bound** | Lanczos3 downscale to a 2560px box |
//! | **Encode** | JPEG q85, optimised Huffman tables |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a normalisation run
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining naming, parameters and backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
pub use calculations::{fit_within, needs_downscale};
pub use operations::{NormalisedImage, normalise, normalise_batch};
pub use params::{DEFAULT_MAX_EDGE, NormaliseParams, Quality};
pub use rust_backend::{RustBackend, supported_input_extensions};
