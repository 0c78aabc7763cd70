//! The perpetual nightly loop.
//!
//! Each cycle captures a night, sequences the frames, distributes and
//! post-processes them according to the settings, then sleeps until half an
//! hour before the next sunset. Only a failed window resolution ends the
//! loop; every other failure is logged and the next night proceeds.

use std::convert::Infallible;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use log::{error, info};

use super::external::{rsync_file, rsync_session, run_logged, ssh_remote_command, CommandRunner};
use super::notify::{notify_best_effort, Notifier};
use super::retention::purge_sessions;
use super::scheduler::CaptureScheduler;
use super::sequencer::{sequence_frames, FramePattern};
use super::solar::next_sunset;
use super::startrails::{build_star_trails, StarTrailCompositor};
use super::timelapse::generate_timelapse;
use crate::camera::{Camera, CameraFactory};
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{Result, SkycamError};
use crate::logbook::Logbook;
use crate::models::NightSession;

/// How long before sunset the next cycle starts.
pub const SETUP_LEAD: Duration = Duration::minutes(30);

/// Where timelapse encoding happens and whether frames leave the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionPlan {
    /// No remote target: optionally encode, keep everything local.
    KeepLocal { encode: bool },
    /// Remote target without a remote command: optionally encode, then upload.
    EncodeThenUpload { encode: bool },
    /// Remote target and command: upload, then let the remote side encode.
    UploadThenRemote { remote_encode: bool },
}

pub fn plan_distribution(settings: &Settings) -> DistributionPlan {
    let encode = settings.timelapse.is_some();
    match &settings.remote {
        None => DistributionPlan::KeepLocal { encode },
        Some(remote) if remote.command.is_none() => DistributionPlan::EncodeThenUpload { encode },
        Some(_) => DistributionPlan::UploadThenRemote {
            remote_encode: encode,
        },
    }
}

/// External collaborators used by the pipeline.
pub struct Collaborators<'a> {
    pub camera_factory: &'a dyn CameraFactory,
    pub runner: &'a dyn CommandRunner,
    pub notifier: &'a dyn Notifier,
    pub compositor: &'a dyn StarTrailCompositor,
}

/// What one cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub session: NightSession,
    pub plan: DistributionPlan,
    pub star_trails: Option<PathBuf>,
    pub purged: Vec<PathBuf>,
}

pub struct NightlyPipeline<'a> {
    settings: &'a Settings,
    clock: &'a dyn Clock,
    collaborators: Collaborators<'a>,
    /// Acquired on the first cycle and kept for the life of the process.
    camera: Option<Box<dyn Camera>>,
    process_log: Logbook,
}

impl<'a> NightlyPipeline<'a> {
    pub fn new(settings: &'a Settings, clock: &'a dyn Clock, collaborators: Collaborators<'a>) -> Self {
        Self {
            settings,
            clock,
            collaborators,
            camera: None,
            process_log: Logbook::new(settings.process_log_path()),
        }
    }

    pub fn camera_acquired(&self) -> bool {
        self.camera.is_some()
    }

    /// Runs cycles forever. Returns only when no imaging window exists.
    pub fn run(&mut self) -> Result<Infallible> {
        loop {
            match self.run_cycle() {
                Ok(report) => info!(
                    "Cycle complete for {} ({} frames)",
                    report.session.date_tag, report.session.frame_count
                ),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Cycle failed: {}", e);
                    self.process_log.msg(format!("ERROR: cycle failed: {}", e));
                }
            }
            self.sleep_until_next_cycle();
        }
    }

    /// Capture, sequence and post-process one night.
    ///
    /// Initializes the camera on first use and keeps it for later cycles.
    ///
    /// # Returns
    ///
    /// What was produced and removed. Distribution and star-trail failures
    /// are logged and do not fail the cycle; capture, sequencing and window
    /// errors do.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let settings = self.settings;
        let clock = self.clock;
        let notifier = self.collaborators.notifier;

        if self.camera.is_none() {
            let camera = self.collaborators.camera_factory.initialize()?;
            self.process_log
                .msg(format!("Camera initialized: {}", camera.name()));
            self.camera = Some(camera);
        }
        let camera = self
            .camera
            .as_deref_mut()
            .ok_or_else(|| SkycamError::config("camera unavailable"))?;

        let mut session = CaptureScheduler::new(settings, clock, notifier).run(camera)?;
        let session_log = Logbook::new(session.log_path());

        let info = sequence_frames(
            &session.directory,
            &settings.file_extension,
            Some(&session_log),
        )?;
        session.frame_count = info.image_count;
        session.padding = info.padding;

        let plan = plan_distribution(settings);
        self.distribute(&mut session, plan, &session_log);

        let star_trails = if settings.create_startrails {
            self.star_trails(&session, &session_log)
        } else {
            None
        };

        if settings.notifications {
            let mut message = format!(
                "Image capture is complete for {} at {}",
                session.date_tag,
                settings.format_local_short(clock.now())
            );
            if let (Some(remote), Some(destination)) =
                (&settings.remote, session.remote_destination(settings))
            {
                message.push_str(&format!(
                    "\nFiles have been uploaded to:{}:{}",
                    remote.host, destination
                ));
            }
            notify_best_effort(notifier, "SkyCam Sequence Complete", &message);
        }

        let purged = match settings.retention_days {
            Some(days) => self.purge(days),
            None => Vec::new(),
        };

        Ok(CycleReport {
            session,
            plan,
            star_trails,
            purged,
        })
    }

    fn distribute(&self, session: &mut NightSession, plan: DistributionPlan, session_log: &Logbook) {
        let settings = self.settings;
        let runner = self.collaborators.runner;
        let fps = settings.timelapse.map(|t| t.fps).unwrap_or_default();

        let encode_locally = |session: &mut NightSession| {
            match generate_timelapse(runner, &session.directory, fps, &settings.file_extension) {
                Ok(_) => session.timelapse_done = true,
                Err(e) => session_log.msg(format!("WARNING: timelapse not generated: {}", e)),
            }
        };
        let upload = |session: &mut NightSession| {
            if let Some(remote) = &settings.remote {
                let spec = rsync_session(&session.directory, remote, &session.date_tag);
                run_logged(runner, &spec, session_log);
                session.uploaded = true;
            }
        };

        match plan {
            DistributionPlan::KeepLocal { encode } => {
                if encode {
                    encode_locally(session);
                }
            }
            DistributionPlan::EncodeThenUpload { encode } => {
                if encode {
                    encode_locally(session);
                }
                upload(session);
            }
            DistributionPlan::UploadThenRemote { remote_encode } => {
                upload(session);
                let remote = settings.remote.as_ref();
                let command = remote.and_then(|r| r.command.as_deref());
                let destination = session.remote_destination(settings);
                if let (true, Some(remote), Some(command), Some(destination)) =
                    (remote_encode, remote, command, destination)
                {
                    let spec = ssh_remote_command(remote, command, &destination, fps);
                    run_logged(runner, &spec, session_log);
                    session.timelapse_done = true;
                }
            }
        }
    }

    fn star_trails(&self, session: &NightSession, session_log: &Logbook) -> Option<PathBuf> {
        let settings = self.settings;
        let pattern = FramePattern::new(session.padding, settings.file_extension.clone());
        session_log.msg(format!("Building star trails from {}", pattern.glob()));

        match build_star_trails(
            self.collaborators.compositor,
            &session.directory,
            &pattern,
            &session.date_tag,
        ) {
            Ok(path) => {
                if let Some(remote) = &settings.remote {
                    let spec = rsync_file(&path, remote, &session.date_tag);
                    run_logged(self.collaborators.runner, &spec, session_log);
                }
                Some(path)
            }
            Err(e) => {
                session_log.msg(format!("WARNING: star trails not generated: {}", e));
                None
            }
        }
    }

    fn purge(&self, days: u32) -> Vec<PathBuf> {
        let settings = self.settings;
        let log = &self.process_log;
        log.divider('=');
        log.msg(format!("Purging folders older than {} days.", days));

        let today = self
            .clock
            .now()
            .with_timezone(&settings.timezone)
            .date_naive();
        match purge_sessions(&settings.base_dir, days, today) {
            Ok(removed) => {
                for dir in &removed {
                    log.msg(format!("Removed {}", dir.display()));
                }
                removed
            }
            Err(e) => {
                log.msg(format!("WARNING: purge failed: {}", e));
                Vec::new()
            }
        }
    }

    /// Instant the next cycle should start.
    ///
    /// # Returns
    ///
    /// [`SETUP_LEAD`] before the next sunset, always later than now. A sunset
    /// closer than the lead (a cycle that failed early in the evening) is
    /// skipped in favour of the one after it. One day from now if the sun
    /// does not set.
    pub fn next_wake_time(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let settings = self.settings;
        let log = &self.process_log;

        let upcoming = next_sunset(&settings.location, now).and_then(|sunset| {
            if sunset - SETUP_LEAD > now {
                Some(sunset)
            } else {
                next_sunset(&settings.location, now + SETUP_LEAD)
            }
        });

        log.divider('-');
        let wake = match upcoming {
            Some(sunset) => {
                let wake = sunset - SETUP_LEAD;
                log.msg(format!(
                    "Run complete. Next sunset is at: {}",
                    settings.format_local(sunset)
                ));
                wake
            }
            None => {
                log.msg("Run complete. The sun does not set within the next day.");
                now + Duration::days(1)
            }
        };
        log.msg(format!(
            "Next run will set up at: {}",
            settings.format_local(wake)
        ));
        log.divider('-');
        wake
    }

    pub fn sleep_until_next_cycle(&self) {
        let wake = self.next_wake_time();
        self.clock.sleep_until(wake);
    }
}
