//! Interview session state machine
//!
//! This module provides the `InterviewSession` orchestrator that manages:
//! - Stage transitions (`Setup → Interview → Result`, global reset)
//! - Question sequencing and answer bookkeeping
//! - Recording via the capture pipeline and timed controller
//! - Evaluation and final-report storage

mod session;
mod stage;

pub use session::InterviewSession;
pub use stage::Stage;
