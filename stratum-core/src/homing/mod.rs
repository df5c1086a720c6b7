//! Axis homing
//!
//! Each axis is referenced against its switch by a small, explicit state
//! machine. The sequencer drives that machine with real moves and handles
//! machine-specific orderings (delta tower groups, Z-safe homing).

pub mod machine;
pub mod sequencer;

pub use machine::{HomingError, HomingEvent, HomingPlan, HomingState};
pub use sequencer::{HomingOutcome, HomingSequencer};
