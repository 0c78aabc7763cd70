#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use skycam::config::SettingsFile;
use skycam::Settings;

/// Settings for a London rig writing into `base`, with `overrides` merged
/// over the defaults.
pub fn settings(base: &Path, overrides: Value) -> Settings {
    let mut value = json!({
        "local_timezone": "Europe/London",
        "image_folder": base,
        "latitude": 51.5,
        "longitude": -0.1,
        "exposure": 30,
        "camera_gain": 200,
        "image_gamma": 50,
        "interval": 270,
        "twilight_phase": 2,
        "file_type": ".jpg",
    });
    if let (Some(map), Some(extra)) = (value.as_object_mut(), overrides.as_object()) {
        for (key, v) in extra {
            map.insert(key.clone(), v.clone());
        }
    }
    let raw: SettingsFile = serde_json::from_value(value).expect("settings fixture");
    Settings::from_raw(raw).expect("valid settings fixture")
}

/// Midday on the June solstice.
pub fn solstice_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap()
}

/// Names of regular files directly inside `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("readable dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}
