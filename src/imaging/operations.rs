//! High-level image operations.
//!
//! These functions combine naming and parameters with backend execution.
//! They take configuration, build parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::NormaliseParams;
use crate::naming::normalised_file_name;
use rayon::prelude::*;
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// An upload after normalisation, ready to hand to a media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalisedImage {
    /// Original base name with a `.jpg` extension.
    pub file_name: String,
    /// Encoded JPEG payload.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl NormalisedImage {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }
}

/// Normalise one upload: upright, RGB or luma, bounded, JPEG.
///
/// `original_name` only contributes the base name of the result. The
/// function has no side effects; feeding its output back in yields an image
/// of the same size.
pub fn normalise(
    backend: &impl ImageBackend,
    bytes: &[u8],
    original_name: &str,
    params: &NormaliseParams,
) -> Result<NormalisedImage> {
    let encoded = backend.normalise(bytes, params)?;
    let file_name = normalised_file_name(original_name);
    debug!(
        file_name = %file_name,
        input_len = bytes.len(),
        output_len = encoded.bytes.len(),
        width = encoded.dimensions.width,
        height = encoded.dimensions.height,
        "normalised upload"
    );
    Ok(NormalisedImage {
        file_name,
        bytes: encoded.bytes,
        width: encoded.dimensions.width,
        height: encoded.dimensions.height,
    })
}

/// Normalise several uploads in parallel.
///
/// Results keep the input order. The first failure aborts the whole batch
/// so callers never persist half of a request.
pub fn normalise_batch<B: AsRef<[u8]> + Sync>(
    backend: &impl ImageBackend,
    uploads: &[(B, String)],
    params: &NormaliseParams,
) -> Result<Vec<NormalisedImage>> {
    uploads
        .par_iter()
        .map(|(bytes, name)| normalise(backend, bytes.as_ref(), name, params))
        .collect()
}
