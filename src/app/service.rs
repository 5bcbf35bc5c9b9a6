//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the supervisory FSM, its shared context and the
//! event queue.  It exposes a clean, hardware-agnostic API.  All I/O flows
//! through port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  TemperaturePort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                      │        AppService         │
//!       MotionPort ◀──│  FSM · Execution · PID    │
//!       HeaterPort ◀──└──────────────────────────┘
//!                                 ▲
//!                     EventQueue ─┘ (any task posts)
//! ```

use std::sync::Arc;

use log::{info, warn};

use crate::config::SystemConfig;
use crate::control::PidConstants;
use crate::diagnostics::{self, FaultRecord, Statistics};
use crate::error::{Error, ProgramError, Result};
use crate::events::{Event, EventQueue};
use crate::execution::{ExecSubState, ExecutionSource, SolderPoint};
use crate::fsm::context::FsmContext;
use crate::fsm::{Fsm, SystemState, TickOutcome};
use crate::upload::ProgramUpload;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{AxisId, ClockPort, Direction, EventSink, MachinePort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService<C: ClockPort> {
    fsm: Fsm,
    ctx: FsmContext,
    queue: Arc<EventQueue>,
    clock: C,
    started_ms: u64,
    last_telemetry_ms: u64,
    tick_count: u64,
}

impl<C: ClockPort> AppService<C> {
    /// Construct the service from a validated configuration.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let queue = Arc::new(EventQueue::new());
        let ctx = FsmContext::new(config, Arc::clone(&queue));
        Ok(Self {
            fsm: Fsm::new(),
            ctx,
            queue,
            clock,
            started_ms: 0,
            last_telemetry_ms: 0,
            tick_count: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start in Init with everything off.  The platform posts
    /// [`Event::InitDone`] once its hardware is up.
    pub fn start(&mut self, hw: &mut impl MachinePort, sink: &mut impl EventSink) {
        let now = self.clock.now_ms();
        self.ctx.now_ms = now;
        self.started_ms = now;
        self.last_telemetry_ms = now;
        self.queue.set_running(true);
        self.fsm.start(&mut self.ctx, hw);
        hw.set_power(0);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {}", self.fsm.current_state());
    }

    /// Stop ticking: heater off, motors released, new events refused.
    pub fn stop(&mut self, hw: &mut impl MachinePort) {
        self.queue.set_running(false);
        self.ctx.heater_off();
        hw.set_power(0);
        hw.enable_all(false);
        info!("AppService stopped in {}", self.fsm.current_state());
    }

    pub fn is_running(&self) -> bool {
        self.queue.is_running()
    }

    /// Producer handle for other tasks.
    pub fn queue(&self) -> Arc<EventQueue> {
        Arc::clone(&self.queue)
    }

    /// Enqueue an event.  `false` if the queue is full or stopped.
    pub fn post_event(&self, event: Event) -> bool {
        self.queue.post(event)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: sample → FSM → heater → emit.
    ///
    /// The `hw` parameter satisfies every machine port at once, which
    /// avoids a double mutable borrow while keeping the port boundary
    /// explicit.
    pub fn tick(&mut self, hw: &mut impl MachinePort, sink: &mut impl EventSink) {
        if !self.is_running() {
            return;
        }
        self.tick_count += 1;
        let now = self.clock.now_ms();
        self.ctx.now_ms = now;

        // 1. Sample the thermocouple
        self.ctx.temperature = hw.read_temperature();

        // 2. FSM tick
        let faults_before = self.ctx.stats.total_faults;
        let completed_before = self.ctx.stats.task_completed_count;
        let outcome = self.fsm.tick(&mut self.ctx, hw);

        // 3. Heater, double-gated on the state
        self.apply_heater(hw);

        // 4. Emit
        match outcome {
            TickOutcome::Transitioned { from, to, event } => {
                sink.emit(&AppEvent::StateChanged { from, to, event });
            }
            TickOutcome::Rejected { state, event } => {
                sink.emit(&AppEvent::TransitionRejected { state, event });
            }
            TickOutcome::Stopped | TickOutcome::Quiet => {}
        }
        if self.ctx.stats.total_faults != faults_before {
            if let Some(record) = self.ctx.stats.last_fault() {
                sink.emit(&AppEvent::Fault(record));
            }
        }
        if self.ctx.stats.task_completed_count != completed_before {
            sink.emit(&AppEvent::JobCompleted {
                total: self.ctx.stats.task_completed_count,
            });
        }
        if now.saturating_sub(self.last_telemetry_ms) >= self.ctx.config.telemetry_interval_ms {
            self.last_telemetry_ms = now;
            sink.emit(&AppEvent::Telemetry(self.telemetry()));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl MachinePort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            AppCommand::StagePoints(points) => self.stage_points(points),
            AppCommand::StageProgram(bytes) => self.stage_program(&bytes),
            AppCommand::Jog { axis, steps } => self.jog(hw, axis, steps),
            AppCommand::Reset => self.reset(hw, sink),
            AppCommand::ResetStatistics => {
                self.reset_statistics();
                Ok(())
            }
            AppCommand::SetPidConstants(constants) => self.set_pid_constants(constants),
            AppCommand::UpdateConfig(config) => self.update_config(config),
        }
    }

    /// Stage a point-table job.  Accepted only while Idle.
    pub fn stage_points(&mut self, points: Vec<SolderPoint>) -> Result<()> {
        self.require_state(SystemState::Idle)?;
        if points.is_empty() {
            return Err(ProgramError::Empty.into());
        }
        info!("Job staged: {} point(s)", points.len());
        self.ctx.staged = Some(ExecutionSource::points(points));
        Ok(())
    }

    /// Stage a program job over a private copy of `bytes`.  Idle only.
    pub fn stage_program(&mut self, bytes: &[u8]) -> Result<()> {
        self.require_state(SystemState::Idle)?;
        let source = ExecutionSource::program(bytes)?;
        info!("Job staged: {} byte program", bytes.len());
        self.ctx.staged = Some(source);
        Ok(())
    }

    /// Stage whatever program is in the upload buffer.
    pub fn stage_from_upload(&mut self, upload: &ProgramUpload) -> Result<()> {
        self.require_state(SystemState::Idle)?;
        let bytes = upload.snapshot()?;
        self.stage_program(&bytes)
    }

    pub fn has_staged_job(&self) -> bool {
        self.ctx.staged.is_some()
    }

    /// Relative move of one axis, bounded by `max_steps_per_tick`.
    pub fn jog(&mut self, hw: &mut impl MachinePort, axis: AxisId, steps: i32) -> Result<()> {
        self.require_state(SystemState::ManualControl)?;
        let max = i32::try_from(self.ctx.config.execution.max_steps_per_tick).unwrap_or(i32::MAX);
        let bounded = steps.clamp(-max, max);
        if bounded != steps {
            warn!("Jog {} by {} clamped to {}", axis.name(), steps, bounded);
        }
        if bounded == 0 {
            return Ok(());
        }
        let motor = hw.axis(axis);
        let target = motor.position().saturating_add(bounded);
        motor.set_direction(if bounded > 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        });
        motor.step_toward(target, bounded.unsigned_abs());
        Ok(())
    }

    /// Leave an error state or Locked: everything off, back to Init, and
    /// InitDone re-posted so the next tick lands in Idle.
    pub fn reset(&mut self, hw: &mut impl MachinePort, sink: &mut impl EventSink) -> Result<()> {
        let from = self.fsm.current_state();
        if !from.is_error() {
            return Err(Error::Busy(from));
        }
        self.ctx.now_ms = self.clock.now_ms();
        self.queue.clear();
        self.fsm.force_transition(SystemState::Init, &mut self.ctx, hw);
        hw.set_power(0);
        self.queue.post(Event::InitDone);
        sink.emit(&AppEvent::Reset { from });
        info!("Reset from {}", from);
        Ok(())
    }

    pub fn set_pid_constants(&mut self, constants: PidConstants) -> Result<()> {
        constants.validate()?;
        self.ctx.regulator.set_constants(constants);
        self.ctx.config.pid = constants;
        info!(
            "PID retuned: kp={} ki={} kd={}",
            constants.kp, constants.ki, constants.kd
        );
        Ok(())
    }

    /// Replace the configuration.  Idle only, so a running job never sees
    /// its limits change underneath it.
    pub fn update_config(&mut self, config: SystemConfig) -> Result<()> {
        self.require_state(SystemState::Idle)?;
        config.validate()?;
        self.ctx.regulator.set_constants(config.pid);
        self.ctx.regulator.set_limits(config.regulator);
        self.ctx.config = config;
        info!("Configuration updated at runtime");
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Reading taken by the last `tick`.
    pub fn temperature(&self) -> Result<f64> {
        self.ctx.temperature.map_err(Error::from)
    }

    pub fn current_state(&self) -> SystemState {
        self.fsm.current_state()
    }

    pub fn is_in_error(&self) -> bool {
        self.fsm.current_state().is_error()
    }

    /// Milliseconds since the current state was entered.
    pub fn time_in_state(&self) -> u64 {
        self.fsm.time_in_state(self.clock.now_ms())
    }

    pub fn get_statistics(&self) -> Statistics {
        let mut stats = self.ctx.stats.clone();
        stats.events_dropped = self.queue.dropped();
        stats
    }

    pub fn reset_statistics(&mut self) {
        self.ctx.stats.reset();
        self.queue.reset_dropped();
        info!("Statistics reset");
    }

    pub fn last_fault(&self) -> Option<FaultRecord> {
        self.ctx.stats.last_fault()
    }

    /// Sub-state of the running job, if any.
    pub fn exec_state(&self) -> Option<ExecSubState> {
        self.ctx.job.as_ref().map(|job| job.state())
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Heater duty applied on the last tick.
    pub fn heater_power(&self) -> u8 {
        if self.fsm.current_state().heater_allowed() {
            self.ctx.commands.heater_power
        } else {
            0
        }
    }

    /// Build a telemetry snapshot from the current context.
    pub fn telemetry(&self) -> TelemetryData {
        let state = self.fsm.current_state();
        TelemetryData {
            uptime_ms: self.ctx.now_ms.saturating_sub(self.started_ms),
            state,
            color: state.color(),
            time_in_state_ms: self.fsm.time_in_state(self.ctx.now_ms),
            temperature_c: self.ctx.temperature.ok(),
            target_c: self.ctx.regulator.target(),
            heater_power: self.heater_power(),
            exec_state: self.exec_state(),
            points_completed: self
                .ctx
                .job
                .as_ref()
                .map_or(0, |job| job.completed_count()),
            error_count: self.ctx.stats.error_count,
            task_completed_count: self.ctx.stats.task_completed_count,
            heap_free: diagnostics::heap_free(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn require_state(&self, required: SystemState) -> Result<()> {
        let current = self.fsm.current_state();
        if current == required {
            Ok(())
        } else {
            Err(Error::Busy(current))
        }
    }

    /// The heater only runs in Heating and Executing, whatever the
    /// handlers left in the command block.
    fn apply_heater(&mut self, hw: &mut impl MachinePort) {
        let power = self.heater_power();
        if power == 0 {
            self.ctx.commands.heater_power = 0;
        }
        hw.set_power(power);
    }
}
