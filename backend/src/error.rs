//! Error types for the capture pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::camera::CameraError;
use crate::models::TwilightPhase;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, SkycamError>;

/// Error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum SkycamError {
    /// Settings could not be read, parsed or validated.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Every twilight phase down to sunset was tried without finding a window.
    /// This is the only error that ends the nightly loop.
    #[error("No imaging window at {reference}: sun never sets (tried {})", format_phases(.attempted))]
    NoImagingWindow {
        reference: DateTime<Utc>,
        attempted: Vec<TwilightPhase>,
    },

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata error in {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Notification error: {message}")]
    Notification { message: String },

    #[error("Star trail error: {message}")]
    StarTrails { message: String },
}

impl SkycamError {
    pub fn config(message: impl Into<String>) -> Self {
        SkycamError::Configuration {
            message: message.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        SkycamError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn metadata(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        SkycamError::Metadata {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for the unrecoverable window-resolution failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SkycamError::NoImagingWindow { .. })
    }
}

fn format_phases(phases: &[TwilightPhase]) -> String {
    phases
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_no_window_message_lists_phases() {
        let err = SkycamError::NoImagingWindow {
            reference: Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap(),
            attempted: vec![TwilightPhase::Civil, TwilightPhase::Sunset],
        };
        let msg = err.to_string();
        assert!(msg.contains("civil twilight -> sunset"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = SkycamError::io(
            "/tmp/nowhere",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/nowhere"));
        assert!(!err.is_fatal());
    }
}
