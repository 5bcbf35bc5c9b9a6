//! PID temperature regulator for the soldering tip
//!
//! Consumes the latest thermocouple reading and the setpoint, produces a
//! heater power command (0–100 %) every control tick.  The regulator
//! never touches hardware; the caller applies the returned power.
//!
//! ```text
//!   reading ──▶ error = target − reading
//!                 │
//!                 ├─ P: kp · error
//!                 ├─ I: ki · ∫error·dt   (clamped, anti-windup)
//!                 └─ D: kd · Δerror/dt
//!                         │
//!                         ▼
//!                 clamp [0, 100] ──▶ power %
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Tuning constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConstants {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidConstants {
    fn default() -> Self {
        Self {
            kp: 4.0,  // saturates until ~25 °C from target
            ki: 0.05, // slow wind-up for steady-state
            kd: 1.0,  // dampen overshoot on approach
        }
    }
}

impl PidConstants {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for k in [self.kp, self.ki, self.kd] {
            if !(k.is_finite() && k >= 0.0) {
                return Err(ConfigError::ValidationFailed(
                    "PID constants must be finite and >= 0",
                ));
            }
        }
        Ok(())
    }
}

/// Setpoint and integral bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegulatorLimits {
    pub min_target_c: f64,
    pub max_target_c: f64,
    /// Integral clamp (°C·s).
    pub min_integral: f64,
    pub max_integral: f64,
    /// Updates closer together than this reuse the previous output.
    pub min_dt_ms: u64,
}

impl Default for RegulatorLimits {
    fn default() -> Self {
        Self {
            min_target_c: 0.0,
            max_target_c: 450.0,
            min_integral: -200.0,
            max_integral: 800.0,
            min_dt_ms: 5,
        }
    }
}

impl RegulatorLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_target_c < self.max_target_c) {
            return Err(ConfigError::ValidationFailed(
                "min_target_c must be below max_target_c",
            ));
        }
        if !(self.min_integral < self.max_integral) {
            return Err(ConfigError::ValidationFailed(
                "min_integral must be below max_integral",
            ));
        }
        if self.min_dt_ms == 0 {
            return Err(ConfigError::ValidationFailed("min_dt_ms must be > 0"));
        }
        Ok(())
    }
}

/// Closed-loop heater regulator.
#[derive(Debug, Clone)]
pub struct TemperatureRegulator {
    constants: PidConstants,
    limits: RegulatorLimits,
    target: f64,
    enabled: bool,
    integral: f64,
    last_error: f64,
    last_time_ms: Option<u64>,
    output: u8,
}

impl TemperatureRegulator {
    /// New regulator: disabled, target 0 °C.
    pub fn new(constants: PidConstants, limits: RegulatorLimits) -> Self {
        Self {
            constants,
            limits,
            target: 0.0,
            enabled: false,
            integral: 0.0,
            last_error: 0.0,
            last_time_ms: None,
            output: 0,
        }
    }

    /// Set the target temperature, clamped to the configured range.
    /// Returns the effective target.  Accumulated state is discarded if
    /// the effective target changed.
    pub fn set_target(&mut self, target_c: f64) -> f64 {
        let clamped = if target_c.is_finite() {
            target_c.clamp(self.limits.min_target_c, self.limits.max_target_c)
        } else {
            warn!("Regulator: non-finite target ignored, using minimum");
            self.limits.min_target_c
        };
        if (clamped - self.target).abs() > f64::EPSILON {
            debug!("Regulator: target {:.1} -> {:.1} °C", self.target, clamped);
            self.target = clamped;
            self.reset();
        }
        clamped
    }

    /// Enabling always starts from a clean accumulator.  Disabling drops
    /// the output to zero at once.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.reset();
        } else {
            self.output = 0;
        }
        self.enabled = enabled;
    }

    /// Run one regulation step and return the heater power (0–100 %).
    pub fn update(&mut self, current_c: f64, now_ms: u64) -> u8 {
        if !self.enabled || self.target <= 0.0 || !current_c.is_finite() {
            self.output = 0;
            return 0;
        }

        let error = self.target - current_c;

        let Some(last_ms) = self.last_time_ms else {
            // First sample after a reset: no dt yet, proportional only.
            self.last_time_ms = Some(now_ms);
            self.last_error = error;
            self.output = Self::clamp_output(self.constants.kp * error);
            return self.output;
        };

        let dt_ms = now_ms.saturating_sub(last_ms);
        if dt_ms < self.limits.min_dt_ms {
            return self.output;
        }
        let dt = dt_ms as f64 / 1000.0;

        self.integral = (self.integral + error * dt)
            .clamp(self.limits.min_integral, self.limits.max_integral);
        let derivative = (error - self.last_error) / dt;

        let raw = self.constants.kp * error
            + self.constants.ki * self.integral
            + self.constants.kd * derivative;

        self.last_error = error;
        self.last_time_ms = Some(now_ms);
        self.output = Self::clamp_output(raw);
        self.output
    }

    pub fn constants(&self) -> PidConstants {
        self.constants
    }

    /// Retune.  The accumulator is discarded.
    pub fn set_constants(&mut self, constants: PidConstants) {
        self.constants = constants;
        self.reset();
    }

    /// Replace the bounds (e.g. after a config update) and re-clamp the target.
    pub fn set_limits(&mut self, limits: RegulatorLimits) {
        self.limits = limits;
        let clamped = self.target.clamp(limits.min_target_c, limits.max_target_c);
        if (clamped - self.target).abs() > f64::EPSILON {
            self.target = clamped;
            self.reset();
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Last power command produced.
    pub fn output(&self) -> u8 {
        self.output
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.last_time_ms = None;
    }

    fn clamp_output(raw: f64) -> u8 {
        if raw.is_nan() {
            return 0;
        }
        raw.clamp(0.0, 100.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regulator() -> TemperatureRegulator {
        let mut r = TemperatureRegulator::new(PidConstants::default(), RegulatorLimits::default());
        r.set_target(300.0);
        r.set_enabled(true);
        r
    }

    #[test]
    fn disabled_outputs_zero() {
        let mut r = TemperatureRegulator::new(PidConstants::default(), RegulatorLimits::default());
        r.set_target(300.0);
        assert_eq!(r.update(20.0, 0), 0);
        assert_eq!(r.update(20.0, 100), 0);
    }

    #[test]
    fn cold_tip_saturates() {
        let mut r = regulator();
        assert_eq!(r.update(20.0, 0), 100);
        assert_eq!(r.update(20.0, 100), 100);
    }

    #[test]
    fn hot_tip_cuts_power() {
        let mut r = regulator();
        r.update(350.0, 0);
        assert_eq!(r.update(350.0, 100), 0);
    }

    #[test]
    fn identical_inputs_at_same_instant_are_idempotent() {
        let mut r = regulator();
        r.update(290.0, 0);
        let first = r.update(295.0, 1_000);
        let integral = r.integral();
        let second = r.update(295.0, 1_000);
        assert_eq!(first, second);
        assert!((r.integral() - integral).abs() < f64::EPSILON);
    }

    #[test]
    fn dt_below_resolution_returns_last_output() {
        let mut r = regulator();
        r.update(290.0, 0);
        let out = r.update(295.0, 100);
        assert_eq!(r.update(200.0, 102), out);
    }

    #[test]
    fn target_is_clamped() {
        let mut r = regulator();
        assert!((r.set_target(9_999.0) - 450.0).abs() < f64::EPSILON);
        assert!((r.set_target(-5.0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn target_change_resets_integral() {
        let mut r = regulator();
        r.update(290.0, 0);
        r.update(290.0, 1_000);
        assert!(r.integral() > 0.0);

        r.set_target(300.0);
        assert!(r.integral() > 0.0, "same target must not reset");

        r.set_target(320.0);
        assert!(r.integral().abs() < f64::EPSILON);
    }

    #[test]
    fn disabled_short_circuits_without_touching_integral() {
        let mut r = regulator();
        r.update(290.0, 0);
        r.update(290.0, 1_000);
        let integral = r.integral();
        assert!(integral > 0.0);

        r.set_enabled(false);
        assert_eq!(r.update(290.0, 2_000), 0);
        assert!((r.integral() - integral).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_target_outputs_zero() {
        let mut r = regulator();
        r.set_target(0.0);
        assert_eq!(r.update(20.0, 0), 0);
        assert_eq!(r.update(20.0, 1_000), 0);
    }

    #[test]
    fn enable_resets_accumulator() {
        let mut r = regulator();
        r.update(290.0, 0);
        r.update(290.0, 1_000);
        assert!(r.integral() > 0.0);
        r.set_enabled(false);
        assert_eq!(r.output(), 0);
        r.set_enabled(true);
        assert!(r.integral().abs() < f64::EPSILON);
    }

    #[test]
    fn set_constants_resets_accumulator() {
        let mut r = regulator();
        r.update(290.0, 0);
        r.update(290.0, 1_000);
        r.set_constants(PidConstants { kp: 1.0, ki: 0.0, kd: 0.0 });
        assert!(r.integral().abs() < f64::EPSILON);
        assert_eq!(r.constants().kp, 1.0);
    }

    #[test]
    fn nan_reading_outputs_zero() {
        let mut r = regulator();
        assert_eq!(r.update(f64::NAN, 0), 0);
    }

    #[test]
    fn invalid_limits_rejected() {
        let limits = RegulatorLimits {
            min_integral: 10.0,
            max_integral: -10.0,
            ..RegulatorLimits::default()
        };
        assert!(limits.validate().is_err());
        assert!(PidConstants { kp: -1.0, ki: 0.0, kd: 0.0 }.validate().is_err());
    }
}
