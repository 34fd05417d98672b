//! Error types for the editing engine.

use thiserror::Error;

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Errors surfaced synchronously by the engine. None of them are fatal:
/// the session is left exactly as it was before the failing call.
#[derive(Debug, Error)]
pub enum EditorError {
    /// An operation was attempted before any image was loaded.
    #[error("No image loaded")]
    NotLoaded,

    /// Encoded image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The composite could not be encoded to the requested format.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// A data URL was malformed or its payload was not valid base64.
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// A raw RGBA buffer did not match its declared dimensions.
    #[error("Raw buffer has {actual} bytes, expected {expected}")]
    InvalidRawBuffer { expected: usize, actual: usize },

    #[error("Cannot delete the last layer")]
    CannotDeleteLastLayer,

    #[error("Cannot delete background layer when other layers exist")]
    CannotDeleteBackground,

    #[error("Invalid layer index: {0}")]
    InvalidLayerIndex(usize),

    #[error("Cannot merge layer {0} down")]
    CannotMerge(usize),

    /// A transform was given dimensions it cannot produce.
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A pixel coordinate fell outside the canvas.
    #[error("Point ({x}, {y}) is outside the canvas")]
    OutOfBounds { x: i64, y: i64 },

    #[error("Invalid color: {0}")]
    InvalidColor(String),
}
