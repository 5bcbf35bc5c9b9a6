//! Runtime statistics and fault history.
//!
//! The supervisory machine keeps one [`Statistics`] record on its context:
//! per-state enter counts and accumulated time, error and completion
//! counters, and a ring of the last [`FAULT_RING_SLOTS`] faults with the
//! state they happened in.  Everything is `Serialize` so the platform can
//! publish it as-is.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::app::ports::AxisId;
use crate::error::SensorFault;
use crate::execution::JobFault;
use crate::fsm::SystemState;

pub const FAULT_RING_SLOTS: usize = 8;

/// Why a fault event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultCause {
    Sensor(SensorFault),
    OverTemperature,
    HeatingTimeout,
    CalibrationTimeout,
    /// Homing finished without endpoint contact.
    NoEndpoint(AxisId),
    AxisStalled(AxisId),
    CooldownTimeout,
    /// Executing was entered with nothing staged.
    NoJob,
}

impl From<SensorFault> for FaultCause {
    fn from(fault: SensorFault) -> Self {
        Self::Sensor(fault)
    }
}

impl From<JobFault> for FaultCause {
    fn from(fault: JobFault) -> Self {
        match fault {
            JobFault::AxisStalled(axis) => Self::AxisStalled(axis),
            JobFault::HomingFailed(axis) => Self::NoEndpoint(axis),
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(fault) => write!(f, "sensor: {fault}"),
            Self::OverTemperature => write!(f, "over temperature"),
            Self::HeatingTimeout => write!(f, "heating timeout"),
            Self::CalibrationTimeout => write!(f, "calibration timeout"),
            Self::NoEndpoint(axis) => write!(f, "no endpoint contact on {}", axis.name()),
            Self::AxisStalled(axis) => write!(f, "{} axis stalled", axis.name()),
            Self::CooldownTimeout => write!(f, "cooldown timeout"),
            Self::NoJob => write!(f, "no job staged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub at_ms: u64,
    pub state: SystemState,
    pub cause: FaultCause,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStats {
    pub enter_count: u32,
    /// Time spent in completed visits.
    pub total_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub states: [StateStats; SystemState::COUNT],
    pub last_state_enter_ms: u64,
    /// Entries into an error state or Locked.
    pub error_count: u32,
    pub task_completed_count: u32,
    pub invalid_transitions: u32,
    pub events_dropped: u32,
    /// Oldest first.
    pub faults: heapless::Vec<FaultRecord, FAULT_RING_SLOTS>,
    pub total_faults: u32,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            states: [StateStats::default(); SystemState::COUNT],
            last_state_enter_ms: 0,
            error_count: 0,
            task_completed_count: 0,
            invalid_transitions: 0,
            events_dropped: 0,
            faults: heapless::Vec::new(),
            total_faults: 0,
        }
    }
}

impl Statistics {
    pub fn state(&self, state: SystemState) -> StateStats {
        self.states[state.index()]
    }

    pub fn record_enter(&mut self, state: SystemState, now_ms: u64) {
        let entry = &mut self.states[state.index()];
        entry.enter_count = entry.enter_count.saturating_add(1);
        self.last_state_enter_ms = now_ms;
    }

    pub fn record_exit(&mut self, state: SystemState, dwell_ms: u64) {
        let entry = &mut self.states[state.index()];
        entry.total_ms = entry.total_ms.saturating_add(dwell_ms);
    }

    /// Append to the fault ring, evicting the oldest record when full.
    pub fn record_fault(&mut self, record: FaultRecord) {
        if self.faults.is_full() {
            self.faults.remove(0);
        }
        let _ = self.faults.push(record);
        self.total_faults = self.total_faults.saturating_add(1);
    }

    pub fn last_fault(&self) -> Option<FaultRecord> {
        self.faults.last().copied()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Free heap in bytes, 0 on the host.
pub fn heap_free() -> u32 {
    #[cfg(target_os = "espidf")]
    {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }
    #[cfg(not(target_os = "espidf"))]
    {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(at_ms: u64) -> FaultRecord {
        FaultRecord {
            at_ms,
            state: SystemState::Heating,
            cause: FaultCause::HeatingTimeout,
        }
    }

    #[test]
    fn fault_ring_keeps_newest() {
        let mut stats = Statistics::default();
        for i in 0..(FAULT_RING_SLOTS as u64 + 3) {
            stats.record_fault(record(i));
        }
        assert_eq!(stats.faults.len(), FAULT_RING_SLOTS);
        assert_eq!(stats.faults.first().map(|r| r.at_ms), Some(3));
        assert_eq!(stats.last_fault().map(|r| r.at_ms), Some(10));
        assert_eq!(stats.total_faults, 11);
    }

    #[test]
    fn enter_and_exit_accumulate() {
        let mut stats = Statistics::default();
        stats.record_enter(SystemState::Idle, 100);
        stats.record_exit(SystemState::Idle, 400);
        stats.record_enter(SystemState::Idle, 900);
        let idle = stats.state(SystemState::Idle);
        assert_eq!(idle.enter_count, 2);
        assert_eq!(idle.total_ms, 400);
        assert_eq!(stats.last_state_enter_ms, 900);
    }

    #[test]
    fn reset_clears_everything() {
        let mut stats = Statistics::default();
        stats.error_count = 3;
        stats.record_fault(record(1));
        stats.reset();
        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn causes_convert() {
        assert_eq!(
            FaultCause::from(SensorFault::OpenCircuit),
            FaultCause::Sensor(SensorFault::OpenCircuit)
        );
        assert_eq!(
            FaultCause::from(JobFault::AxisStalled(AxisId::Y)),
            FaultCause::AxisStalled(AxisId::Y)
        );
    }

    #[test]
    fn serializes_to_json() {
        let mut stats = Statistics::default();
        stats.record_fault(record(5));
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("HeatingTimeout"));
    }
}
