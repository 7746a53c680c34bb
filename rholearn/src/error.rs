use spherical::SphericalError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RholearnError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("no invariant (lambda = 0) block for species {species} to gate key {key}")]
    MissingInvariant { species: u32, key: String },
    #[error("structure mismatch: {0}")]
    StructureMismatch(String),
    #[error(transparent)]
    Spherical(#[from] SphericalError),
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RholearnError>;

impl RholearnError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        RholearnError::Config(msg.into())
    }

    pub(crate) fn dims(msg: impl Into<String>) -> Self {
        RholearnError::DimensionMismatch(msg.into())
    }
}
