//! Plain-text operator logs.
//!
//! The rig keeps a process log under the base directory and one log per
//! session directory. Lines are mirrored to the `log` facade so they also
//! reach the console subscriber.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::models::session_log_name;

/// Width of divider lines.
pub const DIVIDER_WIDTH: usize = 70;

#[derive(Debug, Clone)]
pub struct Logbook {
    path: PathBuf,
}

impl Logbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn msg(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        self.append(message);
    }

    /// Writes a line of `DIVIDER_WIDTH` copies of `ch` (`=`, `-` or `*`).
    pub fn divider(&self, ch: char) {
        self.append(&divider_line(ch));
    }

    fn append(&self, line: &str) {
        let parent_ready = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
            _ => Ok(()),
        };
        let result = parent_ready
            .and_then(|_| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
            })
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = result {
            warn!("Could not write to {}: {}", self.path.display(), e);
        }
    }
}

/// The session log inside `dir`: an existing `capture_log_*.log`, otherwise one
/// named after the directory.
pub fn session_logbook(dir: &Path) -> Logbook {
    let existing = std::fs::read_dir(dir).ok().and_then(|entries| {
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("capture_log_") && n.ends_with(".log"))
            })
    });
    let path = existing.unwrap_or_else(|| {
        let tag = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        dir.join(session_log_name(&tag))
    });
    Logbook::new(path)
}

pub fn divider_line(ch: char) -> String {
    std::iter::repeat(ch).take(DIVIDER_WIDTH).collect()
}
