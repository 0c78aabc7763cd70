//! The nightly capture state machine.
//!
//! `AwaitingWindow` resolves tonight's window (relaxing the twilight phase as
//! needed), prepares the session directory and blocks until the window opens.
//! `Capturing` takes one exposure after another with a fixed pause between
//! them until the window closes. `Finished` stores the settings snapshot.
//!
//! The pause does not account for the exposure time, so the frame count per
//! hour drifts with exposure length. That is expected.

use std::fs;
use std::time::Duration;

use log::warn;

use super::notify::{notify_best_effort, Notifier};
use super::solar::{resolve_window, WindowResolution};
use crate::camera::{Camera, StopOutcome};
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{Result, SkycamError};
use crate::logbook::Logbook;
use crate::models::{store_json, CaptureSettingsRecord, NightSession, CAPTURE_SETTINGS_FILE};

/// Shortest pause after a failed capture, whatever the configured interval.
pub const FAILED_CAPTURE_PAUSE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    AwaitingWindow,
    Capturing,
    Finished,
}

pub struct CaptureScheduler<'a> {
    settings: &'a Settings,
    clock: &'a dyn Clock,
    notifier: &'a dyn Notifier,
    process_log: Logbook,
    state: SchedulerState,
}

impl<'a> CaptureScheduler<'a> {
    pub fn new(settings: &'a Settings, clock: &'a dyn Clock, notifier: &'a dyn Notifier) -> Self {
        Self {
            settings,
            clock,
            notifier,
            process_log: Logbook::new(settings.process_log_path()),
            state: SchedulerState::AwaitingWindow,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Runs one night from window resolution to the settings snapshot.
    ///
    /// Fails with [`SkycamError::NoImagingWindow`] when the sun does not set.
    pub fn run(&mut self, camera: &mut dyn Camera) -> Result<NightSession> {
        self.state = SchedulerState::AwaitingWindow;
        let session = self.prepare()?;
        let session_log = Logbook::new(session.log_path());
        self.wait_for_window(&session, &session_log);

        self.state = SchedulerState::Capturing;
        self.capture(camera, &session, &session_log)?;

        self.finish(&session, &session_log)?;
        self.state = SchedulerState::Finished;
        Ok(session)
    }

    fn prepare(&self) -> Result<NightSession> {
        let settings = self.settings;
        let log = &self.process_log;
        let now = self.clock.now();

        log.divider('=');
        log.msg(format!("Starting new image run at: {}", settings.format_local(now)));

        let WindowResolution { window, attempted } =
            match resolve_window(&settings.location, settings.phase, now) {
                Ok(resolution) => resolution,
                Err(err) => {
                    for phase in settings.phase.fallback_chain() {
                        log.msg(format!(
                            "Selected twilight phase ({}) does not occur for this location / date.",
                            phase
                        ));
                    }
                    log.divider('*');
                    log.msg("ERROR: sun always above horizon - cannot set start time.  Exiting");
                    log.divider('*');
                    return Err(err);
                }
            };
        for phase in &attempted[..attempted.len() - 1] {
            log.msg(format!(
                "Selected twilight phase ({}) does not occur for this location / date.  Falling back to earlier twilight.",
                phase
            ));
        }

        let date_tag = window.date_tag(&settings.timezone);
        let session = NightSession::new(&settings.base_dir, date_tag, window);
        fs::create_dir_all(&session.directory)
            .map_err(|e| SkycamError::io(&session.directory, e))?;
        log.msg(format!(
            "Capturing images to folder: {}",
            session.directory.display()
        ));
        Ok(session)
    }

    fn wait_for_window(&self, session: &NightSession, session_log: &Logbook) {
        let settings = self.settings;
        let window = &session.window;
        let duration = window.duration();

        session_log.divider('-');
        session_log.msg(format!(
            "Exposure = {} | Gain = {} | Gamma = {}",
            settings.exposure.as_secs_f64(),
            settings.controls.gain,
            settings.controls.gamma
        ));
        session_log.msg(format!("Twilight phase      :  {}", window.phase));
        session_log.msg(format!(
            "Current time is     :  {}",
            settings.format_local(self.clock.now())
        ));
        session_log.msg(format!(
            "Waiting until       :  {}",
            settings.format_local(window.start)
        ));
        session_log.msg(format!(
            "Imaging will end at :  {}",
            settings.format_local(window.end)
        ));
        session_log.msg(format!(
            "Total Duration is   :  {} hours {} minutes",
            duration.num_hours(),
            duration.num_minutes() % 60
        ));
        session_log.divider('-');

        if settings.notifications {
            notify_best_effort(
                self.notifier,
                "Ready For Next Sequence",
                &format!(
                    "SkyCam is online and will begin capture at {}",
                    settings.format_local_short(window.start)
                ),
            );
        }

        self.clock.sleep_until(window.start);

        if settings.notifications {
            notify_best_effort(
                self.notifier,
                "Starting Image Acquisition",
                &format!(
                    "SkyCam is capturing images.\n\nImage capture will finish at {}",
                    settings.format_local_short(window.end)
                ),
            );
        }
    }

    /// Capture loop. Returns the number of frames written.
    ///
    /// A failed capture does not end the night. Repeated failures are logged
    /// sparsely and paced by at least [`FAILED_CAPTURE_PAUSE`].
    fn capture(
        &self,
        camera: &mut dyn Camera,
        session: &NightSession,
        session_log: &Logbook,
    ) -> Result<usize> {
        let settings = self.settings;
        camera.apply_controls(&settings.controls)?;
        session_log.msg(format!(
            "Camera {} ready: {} | WB blue {} | WB red {} | flip {}",
            camera.name(),
            settings.controls.image_type,
            settings.controls.white_balance_blue,
            settings.controls.white_balance_red,
            settings.controls.flip
        ));

        let mut captured = 0;
        let mut failures: u64 = 0;
        while self.clock.now() < session.window.end {
            if camera.stop()? == StopOutcome::Stopped {
                session_log.msg("Halted an exposure that was still in progress");
            }

            let file_name = settings.frame_file_name(self.clock.now());
            let destination = session.directory.join(&file_name);
            let pause = match camera.capture(settings.exposure_micros(), &destination) {
                Ok(()) => {
                    if failures > 0 {
                        session_log.msg(format!(
                            "Capture recovered after {} failed attempts",
                            failures
                        ));
                        failures = 0;
                    }
                    captured += 1;
                    session_log.msg(format!("Captured image: {}", file_name));
                    settings.interval
                }
                Err(e) => {
                    failures += 1;
                    // Persistent faults are reported at 1, 2, 4, 8, ... failures.
                    if failures.is_power_of_two() {
                        warn!(
                            "Capture of {} failed ({} in a row): {}",
                            file_name, failures, e
                        );
                        session_log.msg(format!(
                            "Capture failed: {} ({}) [{} in a row]",
                            file_name, e, failures
                        ));
                    }
                    settings.interval.max(FAILED_CAPTURE_PAUSE)
                }
            };
            self.clock.sleep(pause);
        }

        session_log.msg(format!("Finished capturing images ({} frames)", captured));
        session_log.divider('-');
        Ok(captured)
    }

    fn finish(&self, session: &NightSession, session_log: &Logbook) -> Result<()> {
        let record = CaptureSettingsRecord::snapshot(self.settings, &session.window);
        let path = store_json(&record, &session.directory, CAPTURE_SETTINGS_FILE)?;
        self.process_log.divider('-');
        self.process_log
            .msg(format!("Storing data to file: {}", path.display()));
        self.process_log.divider('-');
        session_log.msg(format!("Settings stored in {}", CAPTURE_SETTINGS_FILE));
        Ok(())
    }
}
