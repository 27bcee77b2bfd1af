//! Error types for streetbot-core

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed map image
    #[error("Invalid map image: {0}")]
    MapFormat(String),

    /// Intersection geometry could not be inferred from the image
    #[error("Unable to determine intersection geometry")]
    MapGeometry,

    /// Malformed calibration file
    #[error("Invalid calibration data: {0}")]
    Calibration(String),
}
