//! RGB status LED driver.
//!
//! Three LEDC PWM channels (CH1-3) drive discrete R/G/B LEDs showing the
//! supervisory state's colour class.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives three LEDC PWM channels via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::fsm::StateColor;

pub struct StatusLed {
    current: (u8, u8, u8),
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLed {
    pub fn new() -> Self {
        Self { current: (0, 0, 0) }
    }

    pub fn set_colour(&mut self, r: u8, g: u8, b: u8) {
        if self.current == (r, g, b) {
            return;
        }
        hw_init::ledc_set(hw_init::LEDC_CH_LED_R, r);
        hw_init::ledc_set(hw_init::LEDC_CH_LED_G, g);
        hw_init::ledc_set(hw_init::LEDC_CH_LED_B, b);
        self.current = (r, g, b);
    }

    pub fn show(&mut self, color: StateColor) {
        let (r, g, b) = Self::rgb(color);
        self.set_colour(r, g, b);
    }

    pub fn off(&mut self) {
        self.set_colour(0, 0, 0);
    }

    pub fn current_colour(&self) -> (u8, u8, u8) {
        self.current
    }

    fn rgb(color: StateColor) -> (u8, u8, u8) {
        match color {
            StateColor::Ash => (40, 40, 40),
            StateColor::Yellow => (255, 180, 0),
            StateColor::Green => (0, 255, 0),
            StateColor::Red => (255, 0, 0),
            StateColor::Other => (0, 0, 255),
        }
    }
}
