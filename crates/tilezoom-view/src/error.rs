//! Error types for the view layer.

use std::path::PathBuf;

use thiserror::Error;
use tilezoom_decode::DecodeError;

/// Result type alias for view operations.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors surfaced by configuration loading and viewer setup.
///
/// Per-tile decode failures never show up here; they end as
/// [`TileState::Failed`](crate::TileState::Failed) tiles and a log line.
#[derive(Debug, Error)]
pub enum ViewError {
    /// Configuration file could not be parsed.
    #[error("invalid config {path}: {reason}")]
    Config {
        /// Config file path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// RON parse error for in-memory config text.
    #[error("config parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// The image source could not be opened for tiling.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Decode worker pool could not be started.
    #[error("decode thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Operation needs state that is not set up yet.
    #[error("not ready: {0}")]
    NotReady(&'static str),

    /// I/O error while reading config.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewError {
    /// Creates a [`ViewError::Config`] error.
    pub fn config(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if this is a setup-time decode failure.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ViewError::config("/tmp/zoom.ron", "expected struct");
        assert_eq!(err.to_string(), "invalid config /tmp/zoom.ron: expected struct");
        assert!(!err.is_decode_error());
    }

    #[test]
    fn decode_error_converts() {
        let err: ViewError = DecodeError::open("mem:x", "broken").into();
        assert!(err.is_decode_error());
        assert!(err.to_string().contains("mem:x"));
    }
}
