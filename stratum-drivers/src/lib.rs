//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in stratum-core for input hardware:
//!
//! - Endstop switches on `embedded-hal` input pins
//! - Debouncing
//! - A latched endstop bank for the stepper executor

#![no_std]
#![deny(unsafe_code)]

pub mod endstop;

pub use endstop::{Debounced, EndstopBank, EndstopSwitch};
