//! System configuration parameters
//!
//! All tunable parameters for the soldering station.  Persisted loading is
//! the platform's job; the core only validates what it is handed.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::control::pid::{PidConstants, RegulatorLimits};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Timing ---
    /// Scheduler tick period (milliseconds)
    pub tick_rate_ms: u32,
    /// Telemetry report interval (milliseconds)
    pub telemetry_interval_ms: u64,

    // --- Thermal ---
    /// Working tip temperature (Celsius)
    pub target_temperature_c: f64,
    /// Band around the target that counts as "at temperature"
    pub temperature_tolerance_c: f64,
    /// Time the reading must stay inside the band before heating completes
    pub heat_soak_ms: u64,
    /// Deviation during a job that is reported as drift
    pub drift_threshold_c: f64,
    /// Hard ceiling; any reading above this is a heating fault
    pub max_temperature_c: f64,
    /// Tip is safe to leave unattended below this
    pub safe_temperature_c: f64,

    // --- Timeouts ---
    pub heating_timeout_ms: u64,
    pub calibration_timeout_ms: u64,
    /// Wait after the last axis is homed before calibration succeeds
    pub calibration_settle_ms: u64,
    pub cooldown_timeout_ms: u64,

    // --- Regulator ---
    pub pid: PidConstants,
    pub regulator: RegulatorLimits,

    // --- Motion ---
    pub execution: ExecutionConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_rate_ms: 20,             // 50 Hz
            telemetry_interval_ms: 1_000, // 1 Hz

            // Thermal
            target_temperature_c: 330.0,
            temperature_tolerance_c: 5.0,
            heat_soak_ms: 1_000,
            drift_threshold_c: 15.0,
            max_temperature_c: 450.0,
            safe_temperature_c: 50.0,

            // Timeouts
            heating_timeout_ms: 120_000,
            calibration_timeout_ms: 30_000,
            calibration_settle_ms: 500,
            cooldown_timeout_ms: 600_000,

            // Regulator
            pid: PidConstants::default(),
            regulator: RegulatorLimits::default(),

            // Motion
            execution: ExecutionConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Reject configurations that would make the machine unsafe or the
    /// state machine unable to make progress.  Values are never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_rate_ms must be > 0"));
        }
        if !(self.temperature_tolerance_c.is_finite() && self.temperature_tolerance_c > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "temperature_tolerance_c must be > 0",
            ));
        }
        if self.target_temperature_c < self.regulator.min_target_c
            || self.target_temperature_c > self.regulator.max_target_c
        {
            return Err(ConfigError::ValidationFailed(
                "target_temperature_c outside regulator range",
            ));
        }
        if self.safe_temperature_c >= self.target_temperature_c {
            return Err(ConfigError::ValidationFailed(
                "safe_temperature_c must be below target_temperature_c",
            ));
        }
        if self.max_temperature_c <= self.target_temperature_c + self.temperature_tolerance_c {
            return Err(ConfigError::ValidationFailed(
                "max_temperature_c must exceed target plus tolerance",
            ));
        }
        if self.drift_threshold_c < self.temperature_tolerance_c {
            return Err(ConfigError::ValidationFailed(
                "drift_threshold_c must not be tighter than the tolerance",
            ));
        }
        if self.heating_timeout_ms == 0
            || self.calibration_timeout_ms == 0
            || self.cooldown_timeout_ms == 0
        {
            return Err(ConfigError::ValidationFailed("timeouts must be > 0"));
        }
        if self.heat_soak_ms >= self.heating_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "heat_soak_ms must be shorter than heating_timeout_ms",
            ));
        }
        self.pid.validate()?;
        self.regulator.validate()?;
        self.execution.validate()
    }

    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Execution (motion) configuration
// ---------------------------------------------------------------------------

/// Machine geometry for one job.  Z grows towards the work surface:
/// `home_z` is above `safe_z`, which is above `soldering_z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Z position (steps) that clears the board for XY travel.
    pub safe_z: i32,
    /// Z position (steps) at which the tip touches the pad.
    pub soldering_z: i32,
    pub home_x: i32,
    pub home_y: i32,
    pub home_z: i32,
    /// Upper bound on steps any axis moves in one tick.
    pub max_steps_per_tick: u32,
    /// Axis calibration used to convert program coordinates (mm) to steps.
    pub x_steps_per_mm: f64,
    pub y_steps_per_mm: f64,
    /// Wire feeder calibration.
    pub feed_steps_per_mm: f64,
    /// Wire feed speed; converts a commanded length into a feed duration.
    pub feed_rate_mm_per_s: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            safe_z: 16_000,
            soldering_z: 18_000,
            home_x: 0,
            home_y: 0,
            home_z: 0,
            max_steps_per_tick: 200,
            x_steps_per_mm: 80.0,
            y_steps_per_mm: 80.0,
            feed_steps_per_mm: 120.0,
            feed_rate_mm_per_s: 5.0,
        }
    }
}

impl ExecutionConfig {
    /// `true` when `z` is at or above the safe travel height.
    pub fn z_is_clear(&self, z: i32) -> bool {
        if self.soldering_z > self.safe_z {
            z <= self.safe_z
        } else {
            z >= self.safe_z
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.safe_z == self.soldering_z {
            return Err(ConfigError::ValidationFailed(
                "safe_z and soldering_z must differ",
            ));
        }
        if !self.z_is_clear(self.home_z) {
            return Err(ConfigError::ValidationFailed(
                "home_z must be at or above safe_z",
            ));
        }
        if self.max_steps_per_tick == 0 {
            return Err(ConfigError::ValidationFailed("max_steps_per_tick must be > 0"));
        }
        for scale in [
            self.x_steps_per_mm,
            self.y_steps_per_mm,
            self.feed_steps_per_mm,
            self.feed_rate_mm_per_s,
        ] {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ConfigError::ValidationFailed(
                    "axis calibration and feed rate must be > 0",
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Configuration rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The document could not be deserialised.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Malformed => write!(f, "malformed config document"),
        }
    }
}
