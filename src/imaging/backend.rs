//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and normalise. Both work on in-memory byte buffers;
//! storing the result is the caller's job.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust, statically
//! linked into the binary.

use super::params::NormaliseParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A re-encoded JPEG together with its final pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync` so a batch of uploads can be normalised
/// in parallel.
pub trait ImageBackend: Sync {
    /// Get stored image dimensions (before any EXIF orientation is applied).
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode, orient upright, convert to RGB or luma, bound and re-encode as JPEG.
    fn normalise(
        &self,
        bytes: &[u8],
        params: &NormaliseParams,
    ) -> Result<EncodedImage, BackendError>;
}
