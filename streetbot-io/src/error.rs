//! Error types for streetbot-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Hardware-layer error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configured start pose falls outside the map image
    #[error("start pose ({x:.0}, {y:.0}) is outside the map image")]
    StartOutsideImage {
        /// Requested x in pixels
        x: f64,
        /// Requested y in pixels
        y: f64,
    },
}
