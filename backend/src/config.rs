//! Settings file support.
//!
//! Settings are read once at startup from JSON (or TOML, chosen by file
//! extension), validated, and then handed by reference to every component.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraControls, ImageType};
use crate::error::{Result, SkycamError};
use crate::models::{GeoLocation, TwilightPhase};

/// Settings file as written by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsFile {
    pub local_timezone: String,
    pub image_folder: PathBuf,
    pub latitude: f64,
    pub longitude: f64,
    /// Exposure time in seconds
    pub exposure: f64,
    pub camera_gain: i64,
    pub image_gamma: i64,
    /// Pause between frames in seconds
    pub interval: f64,
    pub twilight_phase: u8,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    #[serde(default)]
    pub create_timelapse: bool,
    #[serde(default = "default_timelapse_fps")]
    pub timelapse_fps: u32,
    #[serde(default)]
    pub create_startrails: bool,
    #[serde(default)]
    pub upload_server: Option<String>,
    #[serde(default)]
    pub upload_path: Option<String>,
    #[serde(default)]
    pub remote_command: Option<String>,
    #[serde(default)]
    pub use_pushover: bool,
    #[serde(default = "default_clean_up")]
    pub clean_up_folders: bool,
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep: u32,
    #[serde(default = "default_white_balance_blue")]
    pub white_balance_blue: i64,
    #[serde(default = "default_white_balance_red")]
    pub white_balance_red: i64,
    #[serde(default)]
    pub flip: i64,
    #[serde(default)]
    pub image_type: ImageType,
    /// External program used to trigger exposures
    #[serde(default)]
    pub capture_command: Option<String>,
    #[serde(default = "default_pushover_file")]
    pub pushover_file: PathBuf,
}

fn default_file_type() -> String {
    ".jpg".to_string()
}

fn default_timelapse_fps() -> u32 {
    25
}

/// Longest exposure or capture interval accepted, in seconds.
const MAX_TIMING_SECONDS: f64 = 86_400.0;
/// Longest retention accepted, in days.
const MAX_DAYS_TO_KEEP: u32 = 36_500;

fn default_clean_up() -> bool {
    true
}

fn default_days_to_keep() -> u32 {
    3
}

fn default_white_balance_blue() -> i64 {
    90
}

fn default_white_balance_red() -> i64 {
    53
}

fn default_pushover_file() -> PathBuf {
    PathBuf::from("pushover.json")
}

/// Upload destination for finished sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub path: String,
    /// Command run on the remote host after upload; it receives the
    /// session's remote path and the frame rate.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelapseSettings {
    pub fps: u32,
}

/// Validated, immutable process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub timezone: Tz,
    pub base_dir: PathBuf,
    pub location: GeoLocation,
    pub exposure: Duration,
    pub interval: Duration,
    pub controls: CameraControls,
    pub phase: TwilightPhase,
    /// Frame extension including the leading dot
    pub file_extension: String,
    /// `None` when timelapse encoding is disabled
    pub timelapse: Option<TimelapseSettings>,
    pub create_startrails: bool,
    pub remote: Option<RemoteTarget>,
    pub notifications: bool,
    /// `None` when retention cleanup is disabled
    pub retention_days: Option<u32>,
    pub capture_command: Option<String>,
    pub pushover_file: PathBuf,
}

impl Settings {
    /// Load settings from a JSON or TOML file.
    ///
    /// Relative paths inside the file (`pushover_file`) are resolved against
    /// the settings file's directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Settings file; `.toml` is read as TOML, anything else as JSON
    ///
    /// # Returns
    ///
    /// Validated settings, or a configuration error naming the offending key.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SkycamError::config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut raw = if is_toml {
            toml::from_str::<SettingsFile>(&content).map_err(|e| {
                SkycamError::config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            parse_json(&content).map_err(|e| match e {
                SkycamError::Configuration { message } => {
                    SkycamError::config(format!("{} in {}", message, path.display()))
                }
                other => other,
            })?
        };

        if raw.pushover_file.is_relative() {
            if let Some(parent) = path.parent() {
                raw.pushover_file = parent.join(&raw.pushover_file);
            }
        }

        Self::from_raw(raw)
    }

    /// Load settings from the first standard location that exists.
    pub fn from_default_location() -> Result<Self> {
        let search_paths = [
            PathBuf::from("settings.json"),
            PathBuf::from("settings.toml"),
            PathBuf::from("config/settings.json"),
            PathBuf::from("../settings.json"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(SkycamError::config(
            "No settings.json found in standard locations",
        ))
    }

    pub fn from_raw(raw: SettingsFile) -> Result<Self> {
        let timezone = Tz::from_str(&raw.local_timezone).map_err(|e| {
            SkycamError::config(format!("Unknown timezone '{}': {}", raw.local_timezone, e))
        })?;
        let location = GeoLocation::new(raw.latitude, raw.longitude)?;

        if !(raw.exposure > 0.0 && raw.exposure <= MAX_TIMING_SECONDS) {
            return Err(SkycamError::config(format!(
                "Exposure must be a positive number of seconds, at most one day, got {}",
                raw.exposure
            )));
        }
        if !(raw.interval >= 0.0 && raw.interval <= MAX_TIMING_SECONDS) {
            return Err(SkycamError::config(format!(
                "Interval must be zero or more seconds, at most one day, got {}",
                raw.interval
            )));
        }
        if raw.clean_up_folders && raw.days_to_keep > MAX_DAYS_TO_KEEP {
            return Err(SkycamError::config(format!(
                "days_to_keep must be at most {}, got {}",
                MAX_DAYS_TO_KEEP, raw.days_to_keep
            )));
        }
        let phase = TwilightPhase::try_from(raw.twilight_phase).map_err(SkycamError::config)?;

        let timelapse = if raw.create_timelapse {
            if raw.timelapse_fps == 0 {
                return Err(SkycamError::config("timelapse_fps must be positive"));
            }
            Some(TimelapseSettings {
                fps: raw.timelapse_fps,
            })
        } else {
            None
        };

        let remote = match non_empty(raw.upload_server) {
            Some(host) => {
                let path = non_empty(raw.upload_path).ok_or_else(|| {
                    SkycamError::config("upload_server is set but upload_path is missing")
                })?;
                Some(RemoteTarget {
                    host,
                    path,
                    command: non_empty(raw.remote_command),
                })
            }
            None => None,
        };

        Ok(Self {
            timezone,
            base_dir: raw.image_folder,
            location,
            exposure: Duration::from_secs_f64(raw.exposure),
            interval: Duration::from_secs_f64(raw.interval),
            controls: CameraControls {
                gain: raw.camera_gain,
                gamma: raw.image_gamma,
                white_balance_blue: raw.white_balance_blue,
                white_balance_red: raw.white_balance_red,
                flip: raw.flip,
                image_type: raw.image_type,
            },
            phase,
            file_extension: normalize_extension(&raw.file_type)?,
            timelapse,
            create_startrails: raw.create_startrails,
            remote,
            notifications: raw.use_pushover,
            retention_days: raw.clean_up_folders.then_some(raw.days_to_keep),
            capture_command: non_empty(raw.capture_command),
            pushover_file: raw.pushover_file,
        })
    }

    /// Exposure in whole microseconds, as the camera expects it.
    pub fn exposure_micros(&self) -> u64 {
        self.exposure.as_micros() as u64
    }

    pub fn process_log_path(&self) -> PathBuf {
        self.base_dir.join("skycam.log")
    }

    /// Human-readable local time, e.g. `21-Jun-2024 22:14:05 BST`.
    pub fn format_local(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format("%d-%b-%Y %H:%M:%S %Z")
            .to_string()
    }

    /// Short local time for notifications, e.g. `22:14 21-Jun-2024`.
    pub fn format_local_short(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format("%H:%M %d-%b-%Y")
            .to_string()
    }

    /// Frame file name for a capture at `instant`, e.g. `20240621_221405.jpg`.
    pub fn frame_file_name(&self, instant: DateTime<Utc>) -> String {
        format!(
            "{}{}",
            instant.with_timezone(&self.timezone).format("%Y%m%d_%H%M%S"),
            self.file_extension
        )
    }
}

fn parse_json(content: &str) -> Result<SettingsFile> {
    let deserializer = &mut serde_json::Deserializer::from_str(content);
    serde_path_to_error::deserialize(deserializer).map_err(|e| {
        SkycamError::config(format!("Invalid setting '{}': {}", e.path(), e.inner()))
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn normalize_extension(file_type: &str) -> Result<String> {
    let ext = file_type.trim().trim_start_matches('.');
    if ext.is_empty() || ext.contains(['/', '\\', '*']) {
        return Err(SkycamError::config(format!(
            "Invalid file_type '{}'",
            file_type
        )));
    }
    Ok(format!(".{}", ext))
}
