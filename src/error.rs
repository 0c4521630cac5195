use std::path::PathBuf;

/// Errors surfaced by the library. Gameplay itself never fails; only loading
/// configuration and decoding landmark frames can.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value: {0}")]
    ConfigValue(String),

    #[error("malformed landmark frame: {0}")]
    LandmarkFrame(#[from] serde_json::Error),

    #[error("landmark frame has {0} keypoints, expected {expected}", expected = crate::pose::LANDMARK_COUNT)]
    LandmarkCount(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
