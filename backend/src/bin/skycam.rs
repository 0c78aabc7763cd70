//! SkyCam capture daemon
//!
//! # Usage
//!
//! ```bash
//! # Capture every night until the sun stops setting
//! skycam run /etc/skycam/settings.json
//!
//! # Encode every session directory that has no timelapse yet
//! skycam build-timelapses /etc/skycam/settings.json
//! ```
//!
//! Without a path the settings file is looked up in the standard locations.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use skycam::camera::{CameraFactory, CommandCameraFactory, MockCameraFactory};
use skycam::clock::SystemClock;
use skycam::services::external::SystemCommandRunner;
use skycam::services::notify::{LogNotifier, Notifier};
use skycam::services::startrails::StarTrailCompositor;
use skycam::services::timelapse::build_backlog;
use skycam::services::{Collaborators, NightlyPipeline};
use skycam::Settings;

enum Command {
    Run,
    BuildTimelapses,
}

fn parse_args() -> anyhow::Result<(Command, Option<PathBuf>)> {
    let mut args = env::args().skip(1).peekable();
    let command = match args.peek().map(String::as_str) {
        Some("run") => {
            args.next();
            Command::Run
        }
        Some("build-timelapses") => {
            args.next();
            Command::BuildTimelapses
        }
        _ => Command::Run,
    };
    let config = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        anyhow::bail!("unexpected argument '{}'", extra);
    }
    Ok((command, config))
}

fn load_settings(path: Option<PathBuf>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Settings::from_default_location()?,
    };
    Ok(settings)
}

fn camera_factory(settings: &Settings) -> Box<dyn CameraFactory> {
    match &settings.capture_command {
        Some(command) => Box::new(CommandCameraFactory::new(command.clone())),
        None => {
            warn!("No capture_command configured; writing placeholder frames");
            Box::new(MockCameraFactory::new())
        }
    }
}

fn notifier(settings: &Settings) -> Box<dyn Notifier> {
    #[cfg(feature = "pushover")]
    if settings.notifications {
        use skycam::services::notify::{PushoverCredentials, PushoverNotifier};
        match PushoverCredentials::from_file(&settings.pushover_file) {
            Ok(credentials) => return Box::new(PushoverNotifier::new(credentials)),
            Err(e) => warn!("Pushover disabled: {}", e),
        }
    }
    #[cfg(not(feature = "pushover"))]
    if settings.notifications {
        warn!("Built without the `pushover` feature; notifications go to the log");
    }
    Box::new(LogNotifier)
}

fn compositor() -> Box<dyn StarTrailCompositor> {
    #[cfg(feature = "startrails")]
    {
        Box::new(skycam::services::startrails::LightenCompositor)
    }
    #[cfg(not(feature = "startrails"))]
    {
        Box::new(skycam::services::startrails::UnavailableCompositor)
    }
}

fn main() -> anyhow::Result<ExitCode> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    let (command, config) = parse_args()?;
    let settings = load_settings(config)?;
    info!(
        "Settings loaded: base directory {}, location {:.4}, {:.4}",
        settings.base_dir.display(),
        settings.location.latitude,
        settings.location.longitude
    );

    match command {
        Command::BuildTimelapses => {
            let encoded = build_backlog(&settings, &SystemCommandRunner)?;
            info!("Encoded {} session(s)", encoded);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run => {
            let factory = camera_factory(&settings);
            let notifier = notifier(&settings);
            let compositor = compositor();
            let runner = SystemCommandRunner;
            let clock = SystemClock;

            let mut pipeline = NightlyPipeline::new(
                &settings,
                &clock,
                Collaborators {
                    camera_factory: factory.as_ref(),
                    runner: &runner,
                    notifier: notifier.as_ref(),
                    compositor: compositor.as_ref(),
                },
            );

            match pipeline.run() {
                Ok(never) => match never {},
                Err(e) => {
                    error!("Fatal: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
