//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (steppers, heater, thermocouple, clock, event sinks)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! Axis positions are in machine steps.  No port call may block for
//! longer than a bounded number of steps, with the single exception of
//! [`AxisPort::calibrate`], which is a homing routine owned by the driver.

use serde::{Deserialize, Serialize};

use crate::error::SensorFault;

// ───────────────────────────────────────────────────────────────
// Motion ports
// ───────────────────────────────────────────────────────────────

/// Step direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards higher step counts.
    Forward,
    /// Towards lower step counts (and the endpoint switch).
    Reverse,
}

/// One position-tracking stepper axis.
pub trait AxisPort {
    /// Energise (true) or release (false) the motor driver.
    fn enable(&mut self, enabled: bool);

    fn set_direction(&mut self, direction: Direction);

    /// Move at most `max_steps` towards `target`.  Returns immediately if
    /// already there.
    fn step_toward(&mut self, target: i32, max_steps: u32);

    /// Current position counter.
    fn position(&self) -> i32;

    fn at(&self, position: i32) -> bool {
        self.position() == position
    }

    /// Endpoint (limit) switch state.
    fn endpoint_triggered(&self) -> bool;

    /// Home the axis against its endpoint switch and zero the counter.
    fn calibrate(&mut self);
}

/// Axis identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisId {
    X,
    Y,
    Z,
    /// Solder wire feeder.  Has no endpoint switch and is never homed.
    Feed,
}

impl AxisId {
    pub const ALL: [AxisId; 4] = [AxisId::X, AxisId::Y, AxisId::Z, AxisId::Feed];

    /// Homing order: lift the tool before moving across the board.
    pub const HOMING_ORDER: [AxisId; 3] = [AxisId::Z, AxisId::X, AxisId::Y];

    /// Dense index, matching the order of [`AxisId::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
            Self::Feed => "Feed",
        }
    }
}

/// Access to every axis of the machine.
pub trait MotionPort {
    fn axis(&mut self, id: AxisId) -> &mut dyn AxisPort;

    /// Enable or release every motor.
    fn enable_all(&mut self, enabled: bool) {
        for id in AxisId::ALL {
            self.axis(id).enable(enabled);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Thermal ports
// ───────────────────────────────────────────────────────────────

/// Heater power stage.
pub trait HeaterPort {
    /// Heater duty, 0–100 %.
    fn set_power(&mut self, percent: u8);
}

/// Tip thermocouple.
pub trait TemperaturePort {
    fn read_temperature(&mut self) -> Result<f64, SensorFault>;
}

/// Everything the control loop drives in one tick.
pub trait MachinePort: MotionPort + HeaterPort + TemperaturePort {}

impl<T: MotionPort + HeaterPort + TemperaturePort> MachinePort for T {}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, web
/// UI, display, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
