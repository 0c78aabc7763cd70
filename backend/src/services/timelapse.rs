//! Local timelapse encoding and the backlog of unencoded sessions.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::external::{ffmpeg_timelapse, run_logged, CommandRunner};
use super::sequencer::FramePattern;
use crate::config::Settings;
use crate::error::{Result, SkycamError};
use crate::logbook::session_logbook;
use crate::models::{read_json, FileInfo, FILE_INFO_FILE, SKIP_MARKER, TIMELAPSE_FILE};

/// Encodes the sequenced frames in `session_dir` into `timelapse.mp4`.
///
/// The frame pattern is rebuilt from the padding stored in `file_info.json`,
/// so the directory must have been sequenced first. Any previous output is
/// replaced.
///
/// # Arguments
///
/// * `runner` - Executes the encoder
/// * `session_dir` - Sequenced session directory
/// * `fps` - Output frame rate
/// * `extension` - Frame file extension, with its leading dot
///
/// # Returns
///
/// The output path whether or not the encoder succeeded. Fails when
/// `file_info.json` cannot be read or a previous output cannot be removed.
pub fn generate_timelapse(
    runner: &dyn CommandRunner,
    session_dir: &Path,
    fps: u32,
    extension: &str,
) -> Result<PathBuf> {
    let logbook = session_logbook(session_dir);
    let file_info: FileInfo = read_json(session_dir, FILE_INFO_FILE)?;
    let pattern = FramePattern::new(file_info.padding, extension);

    logbook.divider('-');
    logbook.msg(format!("Starting timelapse    : {}", session_dir.display()));

    let output = session_dir.join(TIMELAPSE_FILE);
    if output.exists() {
        logbook.msg(format!("** Removing existing file: {}", TIMELAPSE_FILE));
        fs::remove_file(&output).map_err(|e| SkycamError::io(&output, e))?;
    }

    let spec = ffmpeg_timelapse(session_dir, &pattern.encoder_input(), fps, TIMELAPSE_FILE);
    run_logged(runner, &spec, &logbook);

    logbook.msg("Timelapse generation complete");
    logbook.divider('-');
    info!("Timelapse generation complete: {}", output.display());
    Ok(output)
}

/// Session directories under `base_dir` that have no timelapse yet and are
/// not marked with `.skip`, sorted by name.
pub fn pending_sessions(base_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pending: Vec<PathBuf> = fs::read_dir(base_dir)
        .map_err(|e| SkycamError::io(base_dir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| !path.join(TIMELAPSE_FILE).exists() && !path.join(SKIP_MARKER).exists())
        .collect();
    pending.sort();
    Ok(pending)
}

/// Encodes every pending session. Sessions that were never sequenced are
/// skipped with a warning. Returns how many encodes were attempted.
pub fn build_backlog(settings: &Settings, runner: &dyn CommandRunner) -> Result<usize> {
    let fps = settings.timelapse.map(|t| t.fps).unwrap_or(25);
    let mut attempted = 0;
    for dir in pending_sessions(&settings.base_dir)? {
        match generate_timelapse(runner, &dir, fps, &settings.file_extension) {
            Ok(_) => attempted += 1,
            Err(e) => log::warn!("Skipping {}: {}", dir.display(), e),
        }
    }
    Ok(attempted)
}
