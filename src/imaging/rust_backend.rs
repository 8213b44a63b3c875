//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate (pure Rust decoders) |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `jpeg-encoder` (optimised Huffman tables) |

use super::backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
use super::calculations::{fit_within, needs_downscale};
use super::params::NormaliseParams;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
///
/// Decoding itself sniffs the content, so this list only matters when
/// picking files out of a directory.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(BackendError::UnsupportedFormat(
            "content does not match any known image format".into(),
        ));
    }
    Ok(reader)
}

/// Map a decoder failure. Reads come from memory, so an I/O error here is a
/// truncated payload and counts as undecodable like any other format error.
fn decode_error(e: ImageError) -> BackendError {
    match e {
        ImageError::Limits(limits) => BackendError::ProcessingFailed(limits.to_string()),
        other => BackendError::UnsupportedFormat(other.to_string()),
    }
}

/// Decode an upload and rotate/flip it upright according to its EXIF tag.
///
/// The returned pixels carry no orientation metadata: `DynamicImage` has
/// nowhere to keep it, and the encoder writes none.
fn load_upright(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let mut decoder = reader(bytes)?.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().map_err(decode_error)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Collapse any colour layout to 8-bit luma or 8-bit RGB.
///
/// Alpha is dropped, wider samples are narrowed, and luma+alpha goes to RGB
/// rather than luma so a transparent grey logo keeps a neutral background.
fn to_encodable(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(img.to_luma8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Encode 8-bit luma or RGB pixels as a baseline JPEG.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    let color = match img {
        DynamicImage::ImageLuma8(_) => jpeg_encoder::ColorType::Luma,
        DynamicImage::ImageRgb8(_) => jpeg_encoder::ColorType::Rgb,
        other => {
            return Err(BackendError::ProcessingFailed(format!(
                "JPEG encoder needs luma or RGB pixels, got {:?}",
                other.color()
            )));
        }
    };
    let width = u16::try_from(img.width()).map_err(|_| {
        BackendError::ProcessingFailed(format!("width {} exceeds JPEG limit", img.width()))
    })?;
    let height = u16::try_from(img.height()).map_err(|_| {
        BackendError::ProcessingFailed(format!("height {} exceeds JPEG limit", img.height()))
    })?;

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(img.as_bytes(), width, height, color)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = reader(bytes)?.into_dimensions().map_err(decode_error)?;
        Ok(Dimensions { width, height })
    }

    fn normalise(
        &self,
        bytes: &[u8],
        params: &NormaliseParams,
    ) -> Result<EncodedImage, BackendError> {
        let img = to_encodable(load_upright(bytes)?);

        let source = (img.width(), img.height());
        let img = if needs_downscale(source, params.max_edge) {
            let (width, height) = fit_within(source, params.max_edge);
            img.resize_exact(width, height, FilterType::Lanczos3)
        } else {
            img
        };

        let bytes = encode_jpeg(&img, params.quality.value())?;
        Ok(EncodedImage {
            bytes,
            dimensions: Dimensions {
                width: img.width(),
                height: img.height(),
            },
        })
    }
}
