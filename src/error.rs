use std::fmt;

/// Control-plane failures.  Coordinate-level operations never produce one of
/// these: out-of-bounds access is a silent no-op and stale patch entries are
/// skipped.
#[derive(Debug)]
pub enum RasterError {
    /// Initial or replacement pixel data does not match `width * height * 4`.
    SizeMismatch { expected: usize, actual: usize },
    /// An `EngineConfig` value is outside its valid range.
    InvalidConfig(String),
    /// Patch encoding/decoding failed.
    Serialize(String),
    /// An input image could not be loaded.
    Image(String),
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::SizeMismatch { expected, actual } => {
                write!(f, "Buffer size mismatch: expected {} bytes, got {}", expected, actual)
            }
            RasterError::InvalidConfig(e) => write!(f, "Invalid config: {}", e),
            RasterError::Serialize(e) => write!(f, "Serialization error: {}", e),
            RasterError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for RasterError {}

impl From<Box<bincode::ErrorKind>> for RasterError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        RasterError::Serialize(e.to_string())
    }
}

impl From<image::ImageError> for RasterError {
    fn from(e: image::ImageError) -> Self {
        RasterError::Image(e.to_string())
    }
}
