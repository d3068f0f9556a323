//! Error types for the tmf-photo-pipeline crate.

/// Errors that can occur while ingesting, compressing or watermarking a photo.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The base64 payload could not be decoded.
    #[error("Invalid base64 image data: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// The bytes are not a decodable JPEG, PNG or WebP image.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// A required textual field was absent or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A date field did not match `YYYY-MM-DD`.
    #[error("{field} must be in YYYY-MM-DD format")]
    InvalidDate {
        /// Human-readable field label.
        field: &'static str,
        /// Underlying parse failure.
        #[source]
        source: chrono::ParseError,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The JPEG encoder rejected the image.
    #[error("JPEG encoding error: {0}")]
    Encode(#[from] jpeg_encoder::EncodingError),

    /// The image is too large to be stored as a JPEG.
    #[error("image of {width}x{height} exceeds the JPEG size limit")]
    TooLarge {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
