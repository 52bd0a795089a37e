//! Persistence error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while saving or loading a world
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// No save file at the path; expected on first run
    #[error("Save file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but is not a valid save document
    #[error("Malformed save file {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PersistenceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistenceError::NotFound { .. })
    }

    /// Short message suitable for players, without paths or error detail
    pub fn user_message(&self) -> &'static str {
        match self {
            PersistenceError::NotFound { .. } => "No save data found",
            PersistenceError::Decode { .. } => "Save data is corrupted",
            PersistenceError::Io { .. } => "Could not access save data",
            PersistenceError::Unexpected(_) => "An unexpected error occurred",
        }
    }
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_distinguish_kinds() {
        let not_found = PersistenceError::NotFound {
            path: PathBuf::from("savedata.json"),
        };
        assert!(not_found.is_not_found());
        assert!(not_found.to_string().contains("savedata.json"));

        let decode = PersistenceError::Decode {
            path: PathBuf::from("savedata.json"),
            source: serde_json::from_str::<u32>("{").unwrap_err(),
        };
        assert!(!decode.is_not_found());
        assert_ne!(decode.user_message(), not_found.user_message());
    }
}
