//! # SkyCam
//!
//! Unattended night-sky capture for an all-sky camera.
//!
//! Every day the rig works out when the sky is dark enough for the configured
//! twilight phase, captures frames at a fixed cadence through that window,
//! renames them into a contiguous numbered sequence and then hands the night
//! off for timelapse encoding, star trail compositing, upload and cleanup.
//!
//! ## Architecture
//!
//! - [`config`]: settings file loading and validation
//! - [`models`]: locations, twilight phases, imaging windows and session records
//! - [`services`]: solar computations, the capture scheduler and the nightly pipeline
//! - [`camera`]: the camera abstraction with command-line and mock backends
//! - [`clock`]: wall clock abstraction so nights can be simulated
//! - [`logbook`]: append-only process and session logs
//! - [`error`]: the crate error type

// SkycamError carries paths and phase lists for context
#![allow(clippy::result_large_err)]

pub mod camera;
pub mod clock;
pub mod config;
pub mod error;
pub mod logbook;
pub mod models;
pub mod services;

pub use config::Settings;
pub use error::{Result, SkycamError};
