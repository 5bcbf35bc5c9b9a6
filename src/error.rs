//! Unified error types for the soldering station core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! service API's error handling uniform.  Leaf errors are small `Copy`
//! enums so they can travel through the FSM and the event sink without
//! allocation.
//!
//! Runtime faults of the machine itself (timeouts, sensor faults, bad
//! program lines) are *not* returned as `Err` from the control loop; they
//! are raised as [`Event`](crate::events::Event)s into the supervisory
//! queue.  `Error` covers the call-site failures: staging a job in the
//! wrong state, an empty upload, an invalid configuration.

use core::fmt;

use crate::config::ConfigError;
use crate::drivers::hw_init::HwInitError;
use crate::fsm::SystemState;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible service operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The temperature sensor could not produce a reading.
    Sensor(SensorFault),
    /// A program buffer was rejected before parsing.
    Program(ProgramError),
    /// Configuration failed validation.
    Config(ConfigError),
    /// The request is not accepted in the current supervisory state.
    Busy(SystemState),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Program(e) => write!(f, "program: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Busy(state) => write!(f, "not accepted in state {}", state.name()),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::GpioConfigFailed(_) => Self::Init("GPIO configuration failed"),
            HwInitError::LedcInitFailed(_) => Self::Init("LEDC configuration failed"),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

/// Why a temperature reading is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SensorFault {
    /// Thermocouple not connected (MAX6675 open-input bit set).
    OpenCircuit,
    /// Bus transfer failed or the sensor is not initialised.
    ReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenCircuit => write!(f, "thermocouple open circuit"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Program errors
// ---------------------------------------------------------------------------

/// Whole-buffer rejections.  Per-line problems never surface here; the
/// parser skips the offending line and keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramError {
    /// Zero-length program.
    Empty,
    /// Program exceeds the parser's buffer limit.
    TooLarge { len: usize, max: usize },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty program"),
            Self::TooLarge { len, max } => {
                write!(f, "program too large ({len} bytes, max {max})")
            }
        }
    }
}

impl From<ProgramError> for Error {
    fn from(e: ProgramError) -> Self {
        Self::Program(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let e: Error = SensorFault::OpenCircuit.into();
        assert_eq!(e.to_string(), "sensor: thermocouple open circuit");

        let e: Error = ProgramError::TooLarge { len: 10, max: 4 }.into();
        assert_eq!(e.to_string(), "program: program too large (10 bytes, max 4)");

        let e = Error::Busy(SystemState::Executing);
        assert_eq!(e.to_string(), "not accepted in state Executing");
    }

    #[test]
    fn peripheral_failures_become_init_errors() {
        let e: Error = HwInitError::GpioConfigFailed(-1).into();
        assert_eq!(e, Error::Init("GPIO configuration failed"));
        let e: Error = HwInitError::LedcInitFailed(259).into();
        assert_eq!(e.to_string(), "init: LEDC configuration failed");
    }

    #[test]
    fn config_error_converts() {
        let e: Error = ConfigError::ValidationFailed("x").into();
        assert!(matches!(e, Error::Config(ConfigError::ValidationFailed("x"))));
    }
}
