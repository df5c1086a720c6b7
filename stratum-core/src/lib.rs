//! Board-agnostic motion preparation logic for the Stratum firmware
//!
//! This crate contains everything between a requested logical destination
//! and the actuator-space segments handed to the stepper executor:
//!
//! - Kinematic transforms (Cartesian, Core, Delta, SCARA)
//! - Bed leveling surfaces (mesh, bilinear with spline subdivision, plane)
//! - Software endstop clamping
//! - Segmented move planning (kinematic and grid-crossing splits)
//! - Homing state machine and sequencer
//! - Z probe routine
//! - Configuration type definitions
//!
//! Hardware is reached only through the traits in [`traits`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;
mod math;

pub mod config;
pub mod homing;
pub mod kinematics;
pub mod leveling;
pub mod motion;
pub mod traits;

#[cfg(test)]
mod sim;
