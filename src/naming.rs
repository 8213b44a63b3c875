//! File naming for stored car photos.
//!
//! Every upload is re-encoded as JPEG, so the stored name keeps only the
//! uploader's base name:
//! - `photo.png` → `photo.jpg`
//! - `IMG_0042.HEIC.jpeg` → `IMG_0042.HEIC.jpg`
//! - `C:\Users\me\front.webp` → `front.jpg`
//!
//! Directory components (either separator) are dropped so a client cannot
//! smuggle a path into the media store.

/// Base name used when an upload arrives without a usable file name.
pub const FALLBACK_STEM: &str = "car-image";

/// Extension of every normalised payload.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Strip directories and the final extension from an uploaded file name.
///
/// A leading dot is part of the stem (`.hidden` stays `.hidden`), matching
/// how dotfiles are usually treated.
pub fn file_stem(original: &str) -> &str {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();
    match base.rfind('.') {
        Some(0) | None => base,
        Some(pos) => &base[..pos],
    }
}

/// Name of the normalised payload for an upload called `original`.
pub fn normalised_file_name(original: &str) -> String {
    let stem = file_stem(original);
    let stem = if stem.is_empty() || stem == "." || stem == ".." {
        FALLBACK_STEM
    } else {
        stem
    };
    format!("{}.{}", stem, OUTPUT_EXTENSION)
}
