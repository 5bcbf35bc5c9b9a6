//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: serial log, web UI, display.

use serde::Serialize;

use crate::diagnostics::FaultRecord;
use crate::events::Event;
use crate::execution::ExecSubState;
use crate::fsm::{StateColor, SystemState};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (carries initial state).
    Started(SystemState),

    /// The supervisory machine transitioned.
    StateChanged {
        from: SystemState,
        to: SystemState,
        event: Event,
    },

    /// An event had no transition from the current state.
    TransitionRejected { state: SystemState, event: Event },

    /// A fault was recorded during this tick.
    Fault(FaultRecord),

    /// A job ran to completion and the tip cooled down.
    JobCompleted { total: u32 },

    /// The machine was reset out of an error state.
    Reset { from: SystemState },

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryData {
    pub uptime_ms: u64,
    pub state: SystemState,
    pub color: StateColor,
    pub time_in_state_ms: u64,
    /// `None` while the sensor is faulted.
    pub temperature_c: Option<f64>,
    pub target_c: f64,
    pub heater_power: u8,
    pub exec_state: Option<ExecSubState>,
    pub points_completed: u32,
    pub error_count: u32,
    pub task_completed_count: u32,
    pub heap_free: u32,
}
