//! Errors returned by catalog operations.

use crate::imaging::BackendError;
use crate::media::MediaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// A semantic rule was broken before anything was written. `field`
    /// names the offending input so callers can point the user at it.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },
    /// A uniqueness or reference rule of the store rejected the write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    /// The uploaded bytes are not a decodable image.
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Image processing failed: {0}")]
    Imaging(BackendError),
    #[error("Media storage failed: {0}")]
    Media(#[from] MediaError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation(message.into())
    }
}

impl From<BackendError> for CatalogError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::UnsupportedFormat(reason) => Self::UnsupportedImageFormat(reason),
            other => Self::Imaging(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_backend_error_maps_to_unsupported_format() {
        let err: CatalogError = BackendError::UnsupportedFormat("not an image".into()).into();
        assert!(matches!(err, CatalogError::UnsupportedImageFormat(_)));
    }

    #[test]
    fn encode_failure_stays_an_imaging_error() {
        let err: CatalogError = BackendError::ProcessingFailed("boom".into()).into();
        assert!(matches!(err, CatalogError::Imaging(_)));
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = CatalogError::validation("model", "does not belong to make Audi");
        assert_eq!(err.to_string(), "Invalid model: does not belong to make Audi");
    }
}
