//! Renames a session's frames into a contiguous, zero-padded sequence.
//!
//! The only ordering signal is each file's modification time. Files sharing
//! a timestamp (coarse filesystem clocks, or frames already renamed once)
//! keep whatever relative order the directory listing produced, so the
//! result is unspecified for them. Sequencing must therefore run exactly once
//! per session directory: the new names carry no capture time, and a second
//! pass can only reshuffle frames that now share nothing but their mtime.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, SkycamError};
use crate::logbook::Logbook;
use crate::models::{store_json, FileInfo, FILE_INFO_FILE};

/// Lower bound on the digit count of sequenced names.
pub const MIN_PADDING: usize = 4;

/// `max(MIN_PADDING, ceil(log10(frame_count)))`; zero frames yield the floor.
pub fn padding_width(frame_count: usize) -> usize {
    let mut digits = 0;
    let mut bound: u128 = 1;
    while bound < frame_count as u128 {
        bound *= 10;
        digits += 1;
    }
    digits.max(MIN_PADDING)
}

/// Sequenced frame name, e.g. `0007.jpg`.
pub fn frame_name(index: usize, padding: usize, extension: &str) -> String {
    format!("{:0width$}{}", index, extension, width = padding)
}

/// Name pattern shared by sequenced frames of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePattern {
    pub padding: usize,
    pub extension: String,
}

impl FramePattern {
    pub fn new(padding: usize, extension: impl Into<String>) -> Self {
        Self {
            padding,
            extension: extension.into(),
        }
    }

    /// Shell glob, e.g. `[0-9][0-9][0-9][0-9].jpg`.
    pub fn glob(&self) -> String {
        format!("{}{}", "[0-9]".repeat(self.padding), self.extension)
    }

    /// printf-style input pattern for the encoder, e.g. `%04d.jpg`.
    pub fn encoder_input(&self) -> String {
        format!("%0{}d{}", self.padding, self.extension)
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name
            .strip_suffix(self.extension.as_str())
            .is_some_and(|stem| stem.len() == self.padding && stem.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Matching files in `dir`, sorted by name.
    pub fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| SkycamError::io(dir, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| self.matches(n))
            })
            .collect();
        frames.sort();
        Ok(frames)
    }
}

/// Captured frames in `dir` with `extension`, oldest modification time first.
fn frames_by_mtime(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| SkycamError::io(dir, e))? {
        let entry = entry.map_err(|e| SkycamError::io(dir, e))?;
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(extension) && n.len() > extension.len());
        if !is_frame {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| SkycamError::io(&path, e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().map_err(|e| SkycamError::io(&path, e))?;
        frames.push((modified, path));
    }
    frames.sort_by_key(|(modified, _)| *modified);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Renames every frame in `dir` to its 1-based position in capture order and
/// records `file_info.json`.
///
/// Not idempotent; see the module docs.
///
/// # Arguments
///
/// * `dir` - Session directory holding the captured frames
/// * `extension` - Frame file extension, with its leading dot
/// * `logbook` - Optional session log for progress lines
///
/// # Returns
///
/// Frame count and padding width, as written to `file_info.json`.
pub fn sequence_frames(dir: &Path, extension: &str, logbook: Option<&Logbook>) -> Result<FileInfo> {
    let frames = frames_by_mtime(dir, extension)?;
    let info = FileInfo {
        image_count: frames.len(),
        padding: padding_width(frames.len()),
    };

    let note = |message: String| {
        if let Some(logbook) = logbook {
            logbook.msg(message);
        }
    };
    let divider = |ch: char| {
        if let Some(logbook) = logbook {
            logbook.divider(ch);
        }
    };

    note("Sorting and renaming files based on file timestamp".to_string());
    divider('-');

    // Stage under names that cannot collide with the final ones, so no frame
    // is overwritten when old and new names overlap.
    let mut staged = Vec::with_capacity(frames.len());
    for (i, original) in frames.iter().enumerate() {
        let temp = dir.join(format!(".sequencing-{}.tmp", i + 1));
        fs::rename(original, &temp).map_err(|e| SkycamError::io(original, e))?;
        staged.push((original, temp));
    }

    for (i, (original, temp)) in staged.into_iter().enumerate() {
        let new_name = frame_name(i + 1, info.padding, extension);
        let target = dir.join(&new_name);
        fs::rename(&temp, &target).map_err(|e| SkycamError::io(&temp, e))?;
        let old_name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        note(format!("{}   ---->   {}", old_name, new_name));
    }

    divider('-');
    note("Done renaming files".to_string());
    divider('-');

    store_json(&info, dir, FILE_INFO_FILE)?;
    Ok(info)
}
