//! Step/dir stepper axis driver (A4988 / TMC2209 class).
//!
//! Each axis has STEP, DIR and active-low ENABLE outputs plus an optional
//! active-low endpoint switch.  The driver keeps the position counter;
//! nothing else in the system reads step pulses.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: toggles GPIOs via hw_init helpers, pulse timing through an
//! `embedded_hal::delay::DelayNs` implementation.
//! On host/test: counts steps in memory, endpoint state is injected.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::{AxisPort, Direction};
use crate::drivers::hw_init;

/// GPIO assignment of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPins {
    pub step: i32,
    pub dir: i32,
    pub enable: i32,
    /// `None` for axes without a limit switch (the feeder).
    pub endpoint: Option<i32>,
}

/// Motion limits of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperTiming {
    /// High time of one STEP pulse.
    pub pulse_us: u32,
    /// Low time between pulses; sets the step rate.
    pub interval_us: u32,
    /// Longest homing run before giving up.
    pub max_homing_steps: u32,
}

impl Default for StepperTiming {
    fn default() -> Self {
        Self {
            pulse_us: 2,
            interval_us: 48,
            max_homing_steps: 40_000,
        }
    }
}

pub struct StepperDriver<D: DelayNs> {
    name: &'static str,
    pins: AxisPins,
    timing: StepperTiming,
    delay: D,
    position: i32,
    direction: Direction,
    enabled: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_endpoint: bool,
}

impl<D: DelayNs> StepperDriver<D> {
    pub fn new(name: &'static str, pins: AxisPins, timing: StepperTiming, delay: D) -> Self {
        let mut driver = Self {
            name,
            pins,
            timing,
            delay,
            position: 0,
            direction: Direction::Forward,
            enabled: false,
            #[cfg(not(target_os = "espidf"))]
            sim_endpoint: false,
        };
        driver.enable(false);
        driver
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Host only: drive the endpoint switch input.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_endpoint(&mut self, triggered: bool) {
        self.sim_endpoint = triggered;
    }

    fn pulse(&mut self) {
        hw_init::gpio_write(self.pins.step, true);
        self.delay.delay_us(self.timing.pulse_us);
        hw_init::gpio_write(self.pins.step, false);
        self.delay.delay_us(self.timing.interval_us);
        match self.direction {
            Direction::Forward => self.position = self.position.saturating_add(1),
            Direction::Reverse => self.position = self.position.saturating_sub(1),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_endpoint(&self) -> bool {
        // Active low with pull-up.
        self.pins
            .endpoint
            .is_some_and(|pin| !hw_init::gpio_read(pin))
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_endpoint(&self) -> bool {
        self.pins.endpoint.is_some() && self.sim_endpoint
    }
}

impl<D: DelayNs> AxisPort for StepperDriver<D> {
    fn enable(&mut self, enabled: bool) {
        // ENABLE is active low.
        hw_init::gpio_write(self.pins.enable, !enabled);
        self.enabled = enabled;
    }

    fn set_direction(&mut self, direction: Direction) {
        hw_init::gpio_write(self.pins.dir, matches!(direction, Direction::Forward));
        self.direction = direction;
    }

    fn step_toward(&mut self, target: i32, max_steps: u32) {
        if !self.enabled || self.position == target {
            return;
        }
        let wanted = if target > self.position {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        if wanted != self.direction {
            self.set_direction(wanted);
        }
        let distance = target.abs_diff(self.position);
        for _ in 0..distance.min(max_steps) {
            self.pulse();
        }
    }

    fn position(&self) -> i32 {
        self.position
    }

    fn endpoint_triggered(&self) -> bool {
        self.read_endpoint()
    }

    fn calibrate(&mut self) {
        if self.pins.endpoint.is_none() {
            debug!("{}: no endpoint switch, position zeroed", self.name);
            self.position = 0;
            return;
        }
        let was_enabled = self.enabled;
        self.enable(true);
        self.set_direction(Direction::Reverse);
        let mut steps = 0;
        while !self.read_endpoint() && steps < self.timing.max_homing_steps {
            self.pulse();
            steps += 1;
        }
        if self.read_endpoint() {
            debug!("{}: homed after {} steps", self.name, steps);
        } else {
            warn!(
                "{}: no endpoint contact after {} steps",
                self.name, self.timing.max_homing_steps
            );
        }
        self.position = 0;
        self.enable(was_enabled);
    }
}
