//! Blocking external tools: rsync, ssh and ffmpeg.
//!
//! Commands run to completion with no timeout and no retry. Their exit status
//! is written to the log and otherwise ignored; a failed upload or encode
//! never stops the nightly loop.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::RemoteTarget;
use crate::logbook::Logbook;

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a finished command exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    /// `None` when terminated by a signal
    pub code: Option<i32>,
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutcome>;
}

/// Runs commands as blocking child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutcome> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        let status = command.status()?;
        Ok(CommandOutcome {
            success: status.success(),
            code: status.code(),
        })
    }
}

/// Runs `spec`, logging the attempt and its exit status.
///
/// # Arguments
///
/// * `runner` - Executes the command
/// * `spec` - Program and arguments
/// * `logbook` - Session or process log receiving the outcome
///
/// # Returns
///
/// The outcome, or `None` when the program could not be started. Failures
/// are logged here and never propagated.
pub fn run_logged(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    logbook: &Logbook,
) -> Option<CommandOutcome> {
    logbook.msg(format!("Running system command: {}", spec));
    match runner.run(spec) {
        Ok(outcome) if outcome.success => {
            logbook.msg(format!("{} finished ({})", spec.program, outcome));
            Some(outcome)
        }
        Ok(outcome) => {
            logbook.msg(format!("WARNING: {} failed ({})", spec.program, outcome));
            Some(outcome)
        }
        Err(e) => {
            logbook.msg(format!("WARNING: could not start {}: {}", spec.program, e));
            None
        }
    }
}

fn remote_spec(remote: &RemoteTarget, date_tag: &str) -> String {
    format!(
        "{}:{}/{}",
        remote.host,
        remote.path.trim_end_matches('/'),
        date_tag
    )
}

/// Copies the contents of `session_dir` into `<host>:<path>/<date_tag>`.
pub fn rsync_session(session_dir: &Path, remote: &RemoteTarget, date_tag: &str) -> CommandSpec {
    CommandSpec::new(
        "rsync",
        [
            "-aq".to_string(),
            format!("{}/", session_dir.display()),
            remote_spec(remote, date_tag),
        ],
    )
}

/// Copies one file into the remote session directory.
pub fn rsync_file(file: &Path, remote: &RemoteTarget, date_tag: &str) -> CommandSpec {
    CommandSpec::new(
        "rsync",
        [
            "-aq".to_string(),
            file.display().to_string(),
            format!("{}/", remote_spec(remote, date_tag)),
        ],
    )
}

/// Runs the configured post-processing command on the remote host with the
/// session's remote path and frame rate as arguments.
pub fn ssh_remote_command(
    remote: &RemoteTarget,
    command: &str,
    remote_dir: &str,
    fps: u32,
) -> CommandSpec {
    CommandSpec::new(
        "ssh",
        [
            remote.host.clone(),
            format!("{} {} {}", command, remote_dir, fps),
        ],
    )
}

/// Encodes `input_pattern` frames from `session_dir` into `output`.
pub fn ffmpeg_timelapse(session_dir: &Path, input_pattern: &str, fps: u32, output: &str) -> CommandSpec {
    CommandSpec::new(
        "ffmpeg",
        [
            "-r".to_string(),
            fps.to_string(),
            "-i".to_string(),
            input_pattern.to_string(),
            "-s".to_string(),
            "hd1080".to_string(),
            "-vf".to_string(),
            "format=rgb24".to_string(),
            "-vcodec".to_string(),
            "h264".to_string(),
            output.to_string(),
        ],
    )
    .in_dir(session_dir)
}

/// Runner that records every command and reports a fixed outcome.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub commands: parking_lot::Mutex<Vec<CommandSpec>>,
    pub fail: bool,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn programs(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutcome> {
        self.commands.lock().push(spec.clone());
        Ok(CommandOutcome {
            success: !self.fail,
            code: Some(if self.fail { 1 } else { 0 }),
        })
    }
}
