use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ImagingWindow, TwilightPhase};
use crate::config::Settings;
use crate::error::{Result, SkycamError};

pub const CAPTURE_SETTINGS_FILE: &str = "capture_settings.json";
pub const FILE_INFO_FILE: &str = "file_info.json";
pub const TIMELAPSE_FILE: &str = "timelapse.mp4";
pub const SKIP_MARKER: &str = ".skip";

/// One run of the nightly pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NightSession {
    /// Local calendar date of the window start, `YYYYMMDD`
    pub date_tag: String,
    pub directory: PathBuf,
    pub window: ImagingWindow,
    pub frame_count: usize,
    pub padding: usize,
    pub timelapse_done: bool,
    pub uploaded: bool,
}

impl NightSession {
    pub fn new(base_dir: &Path, date_tag: String, window: ImagingWindow) -> Self {
        let directory = base_dir.join(&date_tag);
        Self {
            date_tag,
            directory,
            window,
            frame_count: 0,
            padding: 0,
            timelapse_done: false,
            uploaded: false,
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.directory.join(session_log_name(&self.date_tag))
    }

    /// Remote destination `<path>/<date_tag>` if uploads are configured.
    pub fn remote_destination(&self, settings: &Settings) -> Option<String> {
        settings
            .remote
            .as_ref()
            .map(|remote| format!("{}/{}", remote.path.trim_end_matches('/'), self.date_tag))
    }
}

pub fn session_log_name(date_tag: &str) -> String {
    format!("capture_log_{}.log", date_tag)
}

/// Snapshot of the capture parameters stored next to the frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettingsRecord {
    pub start: DateTime<FixedOffset>,
    pub finish: DateTime<FixedOffset>,
    pub twilight_phase: TwilightPhase,
    pub exposure: f64,
    pub gain: i64,
    pub gamma: i64,
    pub interval: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub create_timelapse: bool,
    pub create_startrails: bool,
    pub upload_server: Option<String>,
    pub upload_path: Option<String>,
    pub remote_command: Option<String>,
    pub clean_up_folders: bool,
    pub days_to_keep: u32,
}

impl CaptureSettingsRecord {
    pub fn snapshot(settings: &Settings, window: &ImagingWindow) -> Self {
        let local = |t: DateTime<chrono::Utc>| t.with_timezone(&settings.timezone).fixed_offset();
        Self {
            start: local(window.start),
            finish: local(window.end),
            twilight_phase: window.phase,
            exposure: settings.exposure.as_secs_f64(),
            gain: settings.controls.gain,
            gamma: settings.controls.gamma,
            interval: settings.interval.as_secs_f64(),
            latitude: settings.location.latitude,
            longitude: settings.location.longitude,
            create_timelapse: settings.timelapse.is_some(),
            create_startrails: settings.create_startrails,
            upload_server: settings.remote.as_ref().map(|r| r.host.clone()),
            upload_path: settings.remote.as_ref().map(|r| r.path.clone()),
            remote_command: settings.remote.as_ref().and_then(|r| r.command.clone()),
            clean_up_folders: settings.retention_days.is_some(),
            days_to_keep: settings.retention_days.unwrap_or(0),
        }
    }
}

/// Sequencing result consumed by the timelapse encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub image_count: usize,
    pub padding: usize,
}

/// Writes `data` as pretty JSON to `dir/file_name`.
///
/// # Returns
///
/// The path written.
pub fn store_json<T: Serialize>(data: &T, dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let body = serde_json::to_string_pretty(data)
        .map_err(|e| SkycamError::metadata(&path, e))?;
    fs::write(&path, body).map_err(|e| SkycamError::io(&path, e))?;
    Ok(path)
}

/// Reads `dir/file_name` back; a malformed file is a
/// [`SkycamError::Metadata`] error naming the path.
pub fn read_json<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<T> {
    let path = dir.join(file_name);
    let body = fs::read_to_string(&path).map_err(|e| SkycamError::io(&path, e))?;
    serde_json::from_str(&body).map_err(|e| SkycamError::metadata(&path, e))
}
