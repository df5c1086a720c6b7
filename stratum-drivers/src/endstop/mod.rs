//! Endstop and probe inputs

pub mod bank;
pub mod switch;

pub use bank::EndstopBank;
pub use switch::{Debounced, EndstopSwitch};
