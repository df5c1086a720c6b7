//! Configuration types
//!
//! Board-agnostic machine configuration. With the `toml` feature the
//! configuration can also be parsed from text.

#[cfg(feature = "toml")]
pub mod toml;
pub mod types;

pub use types::*;
