//! Service layer: solar geometry, the capture scheduler and the nightly
//! post-processing pipeline built on top of it.
//!
//! Services depend on the collaborator traits ([`crate::camera::Camera`],
//! [`external::CommandRunner`], [`notify::Notifier`],
//! [`startrails::StarTrailCompositor`], [`crate::clock::Clock`]) rather than
//! on concrete hardware or processes, so a whole night can be driven from
//! tests.

pub mod external;
pub mod notify;
pub mod pipeline;
pub mod retention;
pub mod scheduler;
pub mod sequencer;
pub mod solar;
pub mod startrails;
pub mod timelapse;

pub use pipeline::{plan_distribution, Collaborators, CycleReport, DistributionPlan, NightlyPipeline};
pub use scheduler::{CaptureScheduler, SchedulerState};
pub use solar::{compute_window, next_sunset, resolve_window, solar_altitude, WindowResolution};
