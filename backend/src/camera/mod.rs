//! Camera abstraction for the capture loop.
//!
//! The scheduler only needs to push control values, trigger an exposure into
//! a file and halt anything still in flight. Hardware backends implement
//! [`Camera`]; [`CameraFactory`] performs the one-time acquisition.

pub mod command;
pub mod mock;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use command::{CommandCamera, CommandCameraFactory};
pub use mock::{MockCamera, MockCameraFactory};

/// Error type for camera operations
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// No usable camera was found during initialization
    #[error("No camera available: {0}")]
    NotFound(String),
    /// Hardware communication error
    #[error("Hardware error: {0}")]
    Hardware(String),
    /// Frame capture error
    #[error("Capture error: {0}")]
    Capture(String),
    /// Control value rejected by the device
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Outcome of halting the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// An exposure or video stream was running and has been halted.
    Stopped,
    /// Nothing was in progress.
    Idle,
}

/// Sensor output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    /// 8-bit mono
    Raw8,
    /// 24-bit colour
    #[default]
    Rgb24,
    /// 16-bit mono
    Raw16,
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageType::Raw8 => "8-bit Mono",
            ImageType::Rgb24 => "24-bit Colour",
            ImageType::Raw16 => "16-bit Mono",
        };
        f.write_str(name)
    }
}

/// Frame-affecting control values, re-applied at the start of every capture phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraControls {
    pub gain: i64,
    pub gamma: i64,
    pub white_balance_blue: i64,
    pub white_balance_red: i64,
    pub flip: i64,
    pub image_type: ImageType,
}

impl Default for CameraControls {
    fn default() -> Self {
        Self {
            gain: 50,
            gamma: 50,
            white_balance_blue: 90,
            white_balance_red: 53,
            flip: 0,
            image_type: ImageType::Rgb24,
        }
    }
}

/// Trait for a single-frame still camera.
pub trait Camera {
    /// Camera name/identifier for logs
    fn name(&self) -> &str;

    /// Push control values to the device.
    fn apply_controls(&mut self, controls: &CameraControls) -> CameraResult<()>;

    /// Halt any exposure or video capture in progress.
    ///
    /// # Returns
    /// * `Ok(StopOutcome::Idle)` when there was nothing to stop
    /// * `Err(CameraError)` for genuine device faults
    fn stop(&mut self) -> CameraResult<StopOutcome>;

    /// Take one exposure of `exposure_us` microseconds and write it to `destination`.
    fn capture(&mut self, exposure_us: u64, destination: &Path) -> CameraResult<()>;
}

/// One-time camera acquisition.
pub trait CameraFactory {
    fn initialize(&self) -> CameraResult<Box<dyn Camera>>;
}
