//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides how an upload should be normalised) and the
//! [`backend`](super::backend) (which does the actual pixel work). Keeping
//! them separate lets tests swap in a mock backend without touching the
//! operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 85). Clamped on construction.
//! - [`NormaliseParams`]: Bounding edge and quality for one normalisation run.

/// Longest edge, in pixels, an uploaded car photo may keep.
pub const DEFAULT_MAX_EDGE: u32 = 2560;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Parameters for normalising one upload.
///
/// The output is always JPEG; `max_edge` bounds both dimensions after the
/// EXIF orientation has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormaliseParams {
    pub max_edge: u32,
    pub quality: Quality,
}

impl Default for NormaliseParams {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            quality: Quality::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_85() {
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn default_params_bound_at_2560() {
        let params = NormaliseParams::default();
        assert_eq!(params.max_edge, 2560);
        assert_eq!(params.quality, Quality::new(85));
    }
}
