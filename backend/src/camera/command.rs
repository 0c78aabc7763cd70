//! Camera driven through an external capture program.
//!
//! The program receives the current control values and exposure on every call
//! and must write exactly one frame to the `--output` path before exiting.

use std::path::Path;
use std::process::Command;

use log::debug;

use super::{Camera, CameraControls, CameraError, CameraFactory, CameraResult, StopOutcome};

pub struct CommandCamera {
    program: String,
    base_args: Vec<String>,
    controls: Option<CameraControls>,
}

impl CommandCamera {
    /// `command_line` is the program followed by any fixed arguments.
    pub fn new(command_line: &str) -> CameraResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CameraError::NotFound("empty capture command".to_string()))?;
        Ok(Self {
            program,
            base_args: parts.collect(),
            controls: None,
        })
    }

    fn arguments(&self, controls: &CameraControls, exposure_us: u64, destination: &Path) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "--exposure-us".to_string(),
            exposure_us.to_string(),
            "--gain".to_string(),
            controls.gain.to_string(),
            "--gamma".to_string(),
            controls.gamma.to_string(),
            "--wb-b".to_string(),
            controls.white_balance_blue.to_string(),
            "--wb-r".to_string(),
            controls.white_balance_red.to_string(),
            "--flip".to_string(),
            controls.flip.to_string(),
            "--image-type".to_string(),
            format!("{:?}", controls.image_type).to_lowercase(),
            "--output".to_string(),
            destination.display().to_string(),
        ]);
        args
    }
}

impl Camera for CommandCamera {
    fn name(&self) -> &str {
        &self.program
    }

    fn apply_controls(&mut self, controls: &CameraControls) -> CameraResult<()> {
        self.controls = Some(*controls);
        Ok(())
    }

    fn stop(&mut self) -> CameraResult<StopOutcome> {
        // Each capture runs to completion before returning.
        Ok(StopOutcome::Idle)
    }

    fn capture(&mut self, exposure_us: u64, destination: &Path) -> CameraResult<()> {
        let controls = self
            .controls
            .ok_or_else(|| CameraError::Config("controls not applied before capture".to_string()))?;
        let args = self.arguments(&controls, exposure_us, destination);
        debug!("{} {}", self.program, args.join(" "));

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| CameraError::Hardware(format!("failed to run {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(CameraError::Capture(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

pub struct CommandCameraFactory {
    command_line: String,
}

impl CommandCameraFactory {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
        }
    }
}

impl CameraFactory for CommandCameraFactory {
    fn initialize(&self) -> CameraResult<Box<dyn Camera>> {
        Ok(Box::new(CommandCamera::new(&self.command_line)?))
    }
}
