// ============================================================
// Library Error Type
// ============================================================
// Every failure the core can report to a caller. Application
// and CLI layers wrap these in anyhow with extra context.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// A dataset was given by name where a resolved descriptor is required.
    #[error("expected a resolved dataset descriptor, got bare identifier '{0}'")]
    DatasetType(String),

    #[error("model file not exist: {}", .0.display())]
    CheckpointNotFound(PathBuf),

    #[error("failed to load checkpoint '{}': {reason}", path.display())]
    CheckpointLoad { path: PathBuf, reason: String },

    #[error("failed to save checkpoint '{}': {reason}", path.display())]
    CheckpointSave { path: PathBuf, reason: String },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("invalid network configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
