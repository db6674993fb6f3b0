use crate::types::RunId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown algorithm '{name}'")]
    UnknownAlgorithm { name: String },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not enough data: {0}")]
    NoData(String),

    #[error("Run {run_id} not found")]
    RunNotFound { run_id: RunId },

    #[error("{algorithm} failed: {reason}")]
    Computation {
        algorithm: &'static str,
        reason: String,
    },

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

/// Coarse error class, used by a service boundary to choose a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad algorithm id, malformed parameters, empty input. 4xx.
    CallerInput,
    /// Referenced run does not exist. 404.
    NotFound,
    /// Numerical or algorithmic failure. 5xx.
    Computation,
    /// Store or artifact write failure. 5xx.
    Persistence,
}

impl SegError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownAlgorithm { .. }
            | Self::InvalidParameter { .. }
            | Self::InvalidInput(_)
            | Self::NoData(_) => ErrorKind::CallerInput,
            Self::RunNotFound { .. } => ErrorKind::NotFound,
            Self::Computation { .. } => ErrorKind::Computation,
            Self::Database(_) | Self::Serialization(_) | Self::Io(_) | Self::Persistence(_) => {
                ErrorKind::Persistence
            }
        }
    }

    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn computation(algorithm: &'static str, reason: impl Into<String>) -> Self {
        Self::Computation {
            algorithm,
            reason: reason.into(),
        }
    }
}

pub type SegResult<T> = Result<T, SegError>;
