//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the four stepper axes, the heater, the thermocouple and the
//! status LED, exposing them through [`MotionPort`], [`HeaterPort`] and
//! [`TemperaturePort`].  This is the only module in the system that
//! touches actual hardware.  On non-espidf targets, the underlying
//! drivers use cfg-gated simulation stubs.

use crate::app::ports::{AxisId, AxisPort, ClockPort, HeaterPort, MotionPort, TemperaturePort};
use crate::drivers::heater::HeaterDriver;
use crate::drivers::hw_init::PulseDelay;
use crate::drivers::status_led::StatusLed;
use crate::drivers::stepper::{AxisPins, StepperDriver, StepperTiming};
use crate::drivers::thermocouple::Thermocouple;
use crate::error::SensorFault;
use crate::fsm::StateColor;
use crate::pins;

pub type Axis = StepperDriver<PulseDelay>;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<C: ClockPort> {
    axes: [Axis; 4],
    heater: HeaterDriver,
    thermocouple: Thermocouple<PulseDelay>,
    led: StatusLed,
    clock: C,
}

impl<C: ClockPort> HardwareAdapter<C> {
    /// Board wiring from [`pins`].  The clock paces thermocouple reads.
    pub fn new(clock: C) -> Self {
        let timing = StepperTiming::default();
        let axis = |name, step, dir, enable, endpoint| {
            let pins = AxisPins {
                step,
                dir,
                enable,
                endpoint,
            };
            StepperDriver::new(name, pins, timing, PulseDelay)
        };
        // Order matches AxisId::index().
        let axes = [
            axis("X", pins::X_STEP_GPIO, pins::X_DIR_GPIO, pins::X_ENABLE_GPIO, Some(pins::X_ENDPOINT_GPIO)),
            axis("Y", pins::Y_STEP_GPIO, pins::Y_DIR_GPIO, pins::Y_ENABLE_GPIO, Some(pins::Y_ENDPOINT_GPIO)),
            axis("Z", pins::Z_STEP_GPIO, pins::Z_DIR_GPIO, pins::Z_ENABLE_GPIO, Some(pins::Z_ENDPOINT_GPIO)),
            axis("Feed", pins::FEED_STEP_GPIO, pins::FEED_DIR_GPIO, pins::FEED_ENABLE_GPIO, None),
        ];
        Self {
            axes,
            heater: HeaterDriver::new(),
            thermocouple: Thermocouple::new(
                pins::TC_SCK_GPIO,
                pins::TC_CS_GPIO,
                pins::TC_SO_GPIO,
                PulseDelay,
            ),
            led: StatusLed::new(),
            clock,
        }
    }

    pub fn show_state(&mut self, color: StateColor) {
        self.led.show(color);
    }

    pub fn heater_power(&self) -> u8 {
        self.heater.power()
    }

    /// Direct access for simulation and bring-up.
    pub fn stepper(&mut self, id: AxisId) -> &mut Axis {
        &mut self.axes[id.index()]
    }

    /// Heater off, motors released, LED dark.
    pub fn all_off(&mut self) {
        self.heater.off();
        for axis in &mut self.axes {
            axis.enable(false);
        }
        self.led.off();
    }
}

// ── MotionPort implementation ─────────────────────────────────

impl<C: ClockPort> MotionPort for HardwareAdapter<C> {
    fn axis(&mut self, id: AxisId) -> &mut dyn AxisPort {
        &mut self.axes[id.index()]
    }
}

// ── Thermal port implementations ──────────────────────────────

impl<C: ClockPort> HeaterPort for HardwareAdapter<C> {
    fn set_power(&mut self, percent: u8) {
        self.heater.set(percent);
    }
}

impl<C: ClockPort> TemperaturePort for HardwareAdapter<C> {
    fn read_temperature(&mut self) -> Result<f64, SensorFault> {
        let now = self.clock.now_ms();
        self.thermocouple.read(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::time::Esp32TimeAdapter;

    #[test]
    fn axes_are_wired_in_index_order() {
        let mut hw = HardwareAdapter::new(Esp32TimeAdapter::new());
        hw.enable_all(true);
        hw.axis(AxisId::Y).step_toward(12, 100);
        assert_eq!(hw.stepper(AxisId::Y).position(), 12);
        assert_eq!(hw.stepper(AxisId::X).position(), 0);
    }

    #[test]
    fn only_the_feeder_lacks_an_endpoint() {
        let mut hw = HardwareAdapter::new(Esp32TimeAdapter::new());
        for id in AxisId::ALL {
            hw.stepper(id).sim_set_endpoint(true);
        }
        assert!(hw.axis(AxisId::Z).endpoint_triggered());
        assert!(!hw.axis(AxisId::Feed).endpoint_triggered());
    }

    #[test]
    fn all_off_releases_everything() {
        let mut hw = HardwareAdapter::new(Esp32TimeAdapter::new());
        hw.enable_all(true);
        hw.set_power(60);
        hw.all_off();
        assert_eq!(hw.heater_power(), 0);
        assert!(AxisId::ALL.iter().all(|&id| !hw.stepper(id).is_enabled()));
    }
}
