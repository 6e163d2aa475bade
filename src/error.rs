use std::path::PathBuf;

/// Errors raised by the calibration pipeline and its I/O boundary.
///
/// A pattern that is not found in a single image is not an error; the
/// detector returns `None` and the image is dropped.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("invalid calibration target: {0}")]
    InvalidTarget(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image")]
    Image(#[from] image::ImageError),

    #[error("failed to (de)serialize json")]
    Json(#[from] serde_json::Error),

    #[error("malformed calibration data: {0}")]
    Malformed(String),

    #[error("failed to log to rerun")]
    Recording(#[from] rerun::RecordingStreamError),
}

impl CalibError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> CalibError {
        CalibError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibError>;
