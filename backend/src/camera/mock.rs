use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use super::{Camera, CameraControls, CameraError, CameraFactory, CameraResult, StopOutcome};

/// Everything a [`MockCamera`] has been asked to do.
#[derive(Debug, Default)]
pub struct MockCameraLog {
    pub initializations: usize,
    pub applied_controls: Vec<CameraControls>,
    pub captures: Vec<(u64, PathBuf)>,
    pub stops: usize,
}

/// Camera that writes placeholder frames to disk.
///
/// Each frame gets a strictly increasing modification time so that
/// timestamp-ordered sequencing is deterministic in tests.
pub struct MockCamera {
    log: Arc<Mutex<MockCameraLog>>,
    payload: Vec<u8>,
    mtime_base: SystemTime,
    exposing: bool,
    fail_stop: bool,
    fail_capture: bool,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(MockCameraLog::default())),
            payload: b"mock frame".to_vec(),
            mtime_base: SystemTime::now(),
            exposing: false,
            fail_stop: false,
            fail_capture: false,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Make `stop` report a device fault.
    pub fn with_failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Make every `capture` fail without writing a frame.
    pub fn with_failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    /// Pretend an exposure is already running.
    pub fn with_exposure_in_progress(mut self) -> Self {
        self.exposing = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<MockCameraLog>> {
        Arc::clone(&self.log)
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for MockCamera {
    fn name(&self) -> &str {
        "mock"
    }

    fn apply_controls(&mut self, controls: &CameraControls) -> CameraResult<()> {
        self.log.lock().applied_controls.push(*controls);
        Ok(())
    }

    fn stop(&mut self) -> CameraResult<StopOutcome> {
        if self.fail_stop {
            return Err(CameraError::Hardware("exposure halt timed out".to_string()));
        }
        self.log.lock().stops += 1;
        if std::mem::take(&mut self.exposing) {
            Ok(StopOutcome::Stopped)
        } else {
            Ok(StopOutcome::Idle)
        }
    }

    fn capture(&mut self, exposure_us: u64, destination: &Path) -> CameraResult<()> {
        let index = {
            let mut log = self.log.lock();
            log.captures.push((exposure_us, destination.to_path_buf()));
            log.captures.len() as u64
        };
        if self.fail_capture {
            return Err(CameraError::Capture("sensor read-out failed".to_string()));
        }

        let write = || -> std::io::Result<()> {
            let mut file = File::create(destination)?;
            file.write_all(&self.payload)?;
            file.set_modified(self.mtime_base + Duration::from_secs(index))?;
            Ok(())
        };
        write().map_err(|e| {
            CameraError::Capture(format!("failed to write {}: {}", destination.display(), e))
        })
    }
}

/// Factory handing out one [`MockCamera`] per initialization.
pub struct MockCameraFactory {
    log: Arc<Mutex<MockCameraLog>>,
}

impl MockCameraFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(MockCameraLog::default())),
        }
    }

    /// Shared log of every camera this factory created.
    pub fn log(&self) -> Arc<Mutex<MockCameraLog>> {
        Arc::clone(&self.log)
    }
}

impl Default for MockCameraFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraFactory for MockCameraFactory {
    fn initialize(&self) -> CameraResult<Box<dyn Camera>> {
        self.log.lock().initializations += 1;
        let mut camera = MockCamera::new();
        camera.log = Arc::clone(&self.log);
        Ok(Box::new(camera))
    }
}
