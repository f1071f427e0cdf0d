//! Timed recording controller
//!
//! Drives the countdown → record → auto-stop timeline for a single answer on
//! top of the capture pipeline.

mod controller;

pub use controller::{ControllerEvent, RecordingController, StopReason};
