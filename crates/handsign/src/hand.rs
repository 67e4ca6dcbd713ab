//! Hand pose landmarks and detection.

pub mod detection;
pub mod landmark;
