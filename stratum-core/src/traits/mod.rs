//! Hardware abstraction traits
//!
//! These traits define the interface between the motion logic and the
//! firmware around it: the stepper executor that runs queued lines, the
//! cooperative service hook, and endstop inputs.

pub mod endstop;
pub mod executor;
pub mod service;

pub use endstop::{EndstopId, EndstopSensor};
pub use executor::{DualMotor, MotionExecutor};
pub use service::Service;
