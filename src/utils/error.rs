use thiserror::Error;

/// Errors surfaced to callers of the parser.
///
/// Only unreadable input and failing collaborators end up here. A document
/// that yields no usable fields is not an error; it produces a record whose
/// `is_valid()` is false.
#[derive(Debug, Error)]
pub enum PassportError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Image processing error: {0}")]
    ImageProcessingError(String),

    #[error("OCR error: {0}")]
    OcrError(String),

    #[error("PDF error: {0}")]
    PdfError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for PassportError {
    fn from(err: std::io::Error) -> Self {
        PassportError::IoError(err.to_string())
    }
}

impl From<image::ImageError> for PassportError {
    fn from(err: image::ImageError) -> Self {
        PassportError::ImageProcessingError(err.to_string())
    }
}
