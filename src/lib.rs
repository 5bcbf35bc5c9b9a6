//! Soldering station controller library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod drill;
pub mod error;
pub mod events;
pub mod execution;
pub mod fsm;
pub mod gcode;
pub mod upload;

mod pins;

// Hardware-facing modules compile on every target; the actual register
// access is guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;

pub use error::{Error, Result};
