//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the latest temperature reading, the heater command, the
//! regulator, the job, configuration and statistics.  Think of it as the
//! "blackboard" in a blackboard architecture.  The service fills in the
//! inputs before each tick and applies the outputs after it.

use std::sync::Arc;

use log::warn;

use crate::config::SystemConfig;
use crate::control::TemperatureRegulator;
use crate::diagnostics::{FaultCause, FaultRecord, Statistics};
use crate::error::SensorFault;
use crate::events::{Event, EventQueue};
use crate::execution::{ExecutionSource, ExecutionSubMachine};
use crate::fsm::SystemState;

// ---------------------------------------------------------------------------
// Per-state scratch
// ---------------------------------------------------------------------------

/// Scratch owned by the current state.  Reset on every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Time the current state was entered.
    pub start_ms: u64,
    /// State-specific step counter (e.g. axes homed so far).
    pub iteration_count: u32,
    /// The state's terminal event has been raised; stop acting.
    pub operation_complete: bool,
    /// State-specific timestamp (e.g. when the band was first reached).
    pub checkpoint_ms: Option<u64>,
}

impl ExecutionContext {
    pub fn new(start_ms: u64) -> Self {
        Self {
            start_ms,
            ..Self::default()
        }
    }

    pub fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.start_ms)
    }
}

// ---------------------------------------------------------------------------
// Actuator commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorCommands {
    /// Heater duty, 0–100 %.
    pub heater_power: u8,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    // -- Timing --
    /// Clock reading for the current tick.
    pub now_ms: u64,
    pub exec: ExecutionContext,

    // -- Inputs --
    /// Tip temperature sampled before this tick.
    pub temperature: Result<f64, SensorFault>,

    // -- Outputs --
    pub commands: ActuatorCommands,

    // -- Control --
    pub config: SystemConfig,
    pub regulator: TemperatureRegulator,
    /// Running (or paused) job.
    pub job: Option<ExecutionSubMachine>,
    /// Job waiting for the next Executing entry.
    pub staged: Option<ExecutionSource>,
    /// Drift warning already issued for the current excursion.
    pub drifting: bool,

    // -- Bookkeeping --
    pub stats: Statistics,
    /// State the context was last reset for, used to tag fault records.
    pub state: SystemState,

    queue: Arc<EventQueue>,
}

impl FsmContext {
    pub fn new(config: SystemConfig, queue: Arc<EventQueue>) -> Self {
        Self {
            now_ms: 0,
            exec: ExecutionContext::default(),
            temperature: Err(SensorFault::ReadFailed),
            commands: ActuatorCommands::default(),
            regulator: TemperatureRegulator::new(config.pid, config.regulator),
            config,
            job: None,
            staged: None,
            drifting: false,
            stats: Statistics::default(),
            state: SystemState::Init,
            queue,
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Fresh scratch for a newly entered state.
    pub fn reset_execution(&mut self) {
        self.exec = ExecutionContext::new(self.now_ms);
    }

    /// Post `event`.  Returns `false` if the queue refused it.
    pub fn raise(&mut self, event: Event) -> bool {
        let posted = self.queue.post(event);
        if !posted {
            warn!("FSM: could not raise {}, retrying next tick", event);
        }
        posted
    }

    /// Raise the state's terminal event once.
    pub fn finish(&mut self, event: Event) {
        if self.raise(event) {
            self.exec.operation_complete = true;
        }
    }

    /// Record `cause` and raise the matching fault event once.
    pub fn fault(&mut self, cause: FaultCause, event: Event) {
        if self.exec.operation_complete {
            return;
        }
        if self.raise(event) {
            warn!("FSM: {} in {} -> {}", cause, self.state, event);
            self.exec.operation_complete = true;
            self.stats.record_fault(FaultRecord {
                at_ms: self.now_ms,
                state: self.state,
                cause,
            });
        }
    }

    /// Heater off at once and regulator disabled.
    pub fn heater_off(&mut self) {
        self.regulator.set_enabled(false);
        self.commands.heater_power = 0;
    }

    pub fn elapsed(&self) -> u64 {
        self.exec.elapsed(self.now_ms)
    }

    pub fn tick_ms(&self) -> u32 {
        self.config.tick_rate_ms
    }
}
