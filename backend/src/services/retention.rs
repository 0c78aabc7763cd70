//! Removal of old session directories.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};

use crate::error::{Result, SkycamError};

/// Deletes session directories that fell out of the retention period.
///
/// # Arguments
///
/// * `base_dir` - Directory holding one `YYYYMMDD` subdirectory per night
/// * `days_to_keep` - Sessions dated this many days before `today` or later stay
/// * `today` - Local calendar date of the run
///
/// # Returns
///
/// The removed directories, sorted. Anything not named like a session is left
/// alone, and a cutoff before the earliest representable date removes nothing.
pub fn purge_sessions(base_dir: &Path, days_to_keep: u32, today: NaiveDate) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(days_to_keep))) else {
        return Ok(removed);
    };

    for entry in fs::read_dir(base_dir).map_err(|e| SkycamError::io(base_dir, e))? {
        let entry = entry.map_err(|e| SkycamError::io(base_dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(date) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(session_date)
        else {
            continue;
        };
        if date < cutoff {
            fs::remove_dir_all(&path).map_err(|e| SkycamError::io(&path, e))?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

fn session_date(name: &str) -> Option<NaiveDate> {
    if name.len() != 8 || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(name, "%Y%m%d").ok()
}
