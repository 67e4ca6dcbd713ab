//! Hand sign dataset conversion.
//!
//! Turns a folder of labeled hand sign photographs into a dataset of normalized hand landmark
//! vectors that a classifier can be trained on.
//!
//! The input is a directory whose immediate subdirectories are named after the signs they contain
//! (eg. `HELLO/`, `THANK_YOU/`). Every photograph inside is run through a [`HandDetector`], the
//! first detected hand is [`normalize`]d into a [`FeatureVector`], and the resulting
//! [`Sample`]s are written out as a single JSON array by [`dataset::codec::write`].
//!
//! # Coordinates
//!
//! Landmark coordinates use the conventions of the hand landmark network: X and Y are relative to
//! the input image's width and height, with Y pointing *down*. Z is the relative depth, using
//! roughly the same scale as X.
//!
//! # Environment Variables
//!
//! The `handsign` binary reads its configuration from the command line, falling back to these
//! environment variables:
//!
//! * `HANDSIGN_INPUT_DIR`: The label-organized image tree to convert.
//! * `HANDSIGN_OUTPUT_FILE`: The path the JSON dataset is written to.
//! * `HANDSIGN_MODEL`: Path to the hand landmark ONNX network used for detection.
//!
//! `RUST_LOG` can be used to override the default log levels.
//!
//! [`HandDetector`]: hand::detection::HandDetector
//! [`normalize`]: features::normalize
//! [`FeatureVector`]: features::FeatureVector
//! [`Sample`]: dataset::Sample

use log::LevelFilter;

pub mod dataset;
pub mod error;
pub mod features;
pub mod hand;
pub mod image;
pub mod nn;
pub mod timer;

pub use error::{Error, Result};

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("tract_core"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .filter(Some("tract_hir"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this library will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `tract` will always log at *warn* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
