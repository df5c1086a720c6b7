//! Motion preparation
//!
//! Positions and motion state, software endstops, the segmented move
//! planner, Z probing and the [`MotionSystem`] that ties them together.

pub mod envelope;
pub mod mover;
pub mod planner;
pub mod position;
pub mod probe;
pub mod system;

pub use envelope::{RadialBound, SoftEnvelope};
pub use mover::Mover;
pub use planner::{MoveError, Segment, SegmentedMovePlanner, Segments};
pub use position::{Actuator, ActuatorTarget, Actuators, Axis, AxisFlags, MotionState, Position, Xyz};
pub use probe::{ProbeError, ProbeRoutine};
pub use system::MotionSystem;
