//! Soldering iron heater driver (logic-level MOSFET on LEDC ch0).
//!
//! ## Safety contract
//!
//! The heater must never be powered outside the heating and executing
//! states.  Enforced by the application service; this driver is a dumb
//! actuator.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives real PWM via hw_init helpers.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;

pub struct HeaterDriver {
    percent: u8,
}

impl Default for HeaterDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaterDriver {
    pub fn new() -> Self {
        hw_init::ledc_set(hw_init::LEDC_CH_HEATER, 0);
        Self { percent: 0 }
    }

    /// Set heater power, 0–100 %.  Values above 100 are clamped.
    pub fn set(&mut self, percent: u8) {
        let percent = percent.min(100);
        hw_init::ledc_set(hw_init::LEDC_CH_HEATER, Self::duty_8bit(percent));
        self.percent = percent;
    }

    pub fn off(&mut self) {
        self.set(0);
    }

    pub fn power(&self) -> u8 {
        self.percent
    }

    pub fn is_on(&self) -> bool {
        self.percent > 0
    }

    fn duty_8bit(percent: u8) -> u8 {
        ((percent as u16) * 255 / 100) as u8
    }
}
