use std::io;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

/// Errors raised by the catalog, resolver and presence layers
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Presence service error: {0}")]
    PresenceService(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CoreError::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// True when the error came from a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

pub type Result<T> = StdResult<T, CoreError>;
