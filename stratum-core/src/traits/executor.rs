//! Stepper executor interface
//!
//! The executor owns the step queue and the stepper interrupt. Everything
//! it receives is already in actuator space.

use crate::motion::{ActuatorTarget, Axis};
use crate::traits::EndstopId;

/// One motor of a dual-motor axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DualMotor {
    First,
    Second,
}

/// Queue and stepper control consumed by the motion pipeline
pub trait MotionExecutor {
    /// Queue a straight line in actuator space
    fn buffer_line(&mut self, target: &ActuatorTarget, feedrate_mm_s: f32, tool: u8);

    /// No room for another line right now
    fn queue_full(&self) -> bool;

    /// Lines are queued or executing
    fn is_busy(&self) -> bool;

    /// Redefine the current actuator position without moving
    fn set_position(&mut self, position: &ActuatorTarget);

    /// Actuator position derived from the step counters
    fn measured_position(&self) -> ActuatorTarget;

    /// Stop moves when an endstop triggers
    fn enable_endstops(&mut self, enabled: bool);

    /// Endstop triggered since the last [`clear_endstop_hits`](Self::clear_endstop_hits)
    fn endstop_hit(&self, endstop: EndstopId) -> bool;

    fn clear_endstop_hits(&mut self);

    /// Hold one motor of a dual-motor axis still while the other moves
    fn set_motor_locked(&mut self, _axis: Axis, _motor: DualMotor, _locked: bool) {}
}
