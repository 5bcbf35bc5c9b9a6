//! Mock hardware for integration tests.
//!
//! Records every heater command and axis movement so tests can assert on
//! the full history without touching real GPIO/PWM registers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use solderstation::app::events::AppEvent;
use solderstation::app::ports::{
    AxisId, AxisPort, ClockPort, Direction, EventSink, HeaterPort, MotionPort, TemperaturePort,
};
use solderstation::error::SensorFault;

// ── MockAxis ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockAxis {
    pub position: i32,
    pub enabled: bool,
    /// Ignore step commands (jammed axis).
    pub frozen: bool,
    /// Endpoint switch missing or broken.
    pub no_endpoint: bool,
    pub calibrations: u32,
    /// Largest single `step_toward` request seen.
    pub max_burst: u32,
}

impl AxisPort for MockAxis {
    fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_direction(&mut self, _direction: Direction) {}

    fn step_toward(&mut self, target: i32, max_steps: u32) {
        if self.frozen || !self.enabled {
            return;
        }
        let max = i32::try_from(max_steps).unwrap_or(i32::MAX);
        let delta = target.saturating_sub(self.position).clamp(-max, max);
        self.max_burst = self.max_burst.max(delta.unsigned_abs());
        self.position += delta;
    }

    fn position(&self) -> i32 {
        self.position
    }

    fn endpoint_triggered(&self) -> bool {
        !self.no_endpoint && self.position == 0
    }

    fn calibrate(&mut self) {
        self.calibrations += 1;
        self.position = 0;
    }
}

// ── MockMachine ───────────────────────────────────────────────

pub struct MockMachine {
    pub axes: [MockAxis; 4],
    pub temperature: Result<f64, SensorFault>,
    pub heater_log: Vec<u8>,
}

#[allow(dead_code)]
impl MockMachine {
    pub fn new() -> Self {
        Self {
            axes: Default::default(),
            temperature: Ok(25.0),
            heater_log: Vec::new(),
        }
    }

    pub fn axis_ref(&self, id: AxisId) -> &MockAxis {
        &self.axes[id.index()]
    }

    pub fn axis_mut(&mut self, id: AxisId) -> &mut MockAxis {
        &mut self.axes[id.index()]
    }

    pub fn heater(&self) -> u8 {
        self.heater_log.last().copied().unwrap_or(0)
    }

    pub fn any_axis_enabled(&self) -> bool {
        self.axes.iter().any(|a| a.enabled)
    }
}

impl Default for MockMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionPort for MockMachine {
    fn axis(&mut self, id: AxisId) -> &mut dyn AxisPort {
        &mut self.axes[id.index()]
    }
}

impl HeaterPort for MockMachine {
    fn set_power(&mut self, percent: u8) {
        self.heater_log.push(percent);
    }
}

impl TemperaturePort for MockMachine {
    fn read_temperature(&mut self) -> Result<f64, SensorFault> {
        self.temperature
    }
}

// ── ManualClock ───────────────────────────────────────────────

/// Clock the test advances by hand; clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Event sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { from, to, .. } => {
                    Some((from.name().to_string(), to.name().to_string()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn rejected(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::TransitionRejected { .. }))
            .count()
    }

    pub fn faults(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::Fault(_)))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
