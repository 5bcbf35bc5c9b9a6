//! Concrete state behaviours.
//!
//! One unit struct per state.  Handlers act on the blackboard and raise
//! events; they never switch state themselves.
//!
//! ```text
//!  INIT ─▶ IDLE ─▶ CALIBRATION ─▶ READY ─▶ HEATING ─▶ EXECUTING ─▶ NORMAL_EXIT ─▶ IDLE
//!           │ ▲         │           │         │  ▲        │  │
//!           ▼ │         │           └─▶ IDLE  │  └─PAUSED◀┘  │
//!          MANUAL       ▼                     ▼              ▼
//!               CALIBRATION_ERROR      HEATING_ERROR     DATA_ERROR
//!                        └──────────────────┴──────────────┴──▶ LOCKED
//! ```

use log::{info, warn};

use super::StateBehavior;
use super::context::FsmContext;
use crate::app::ports::{AxisId, MotionPort};
use crate::diagnostics::FaultCause;
use crate::events::Event;
use crate::execution::{ExecSubState, ExecutionSubMachine};

/// Energise the positioning axes and release the feeder.
fn hold_axes(motion: &mut dyn MotionPort) {
    for id in [AxisId::X, AxisId::Y, AxisId::Z] {
        motion.axis(id).enable(true);
    }
    motion.axis(AxisId::Feed).enable(false);
}

/// Heater off, every motor released.
fn all_off(ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
    ctx.heater_off();
    motion.enable_all(false);
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT
// ═══════════════════════════════════════════════════════════════════════════

pub struct InitState;

impl StateBehavior for InitState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        all_off(ctx, motion);
        info!("INIT: waiting for hardware");
    }

    fn on_tick(&self, _ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {}
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

pub struct IdleState;

impl StateBehavior for IdleState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        all_off(ctx, motion);
        ctx.job = None;
        if ctx.staged.take().is_some() {
            info!("IDLE: stale staged job dropped");
        }
        info!("IDLE: system quiescent");
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        ctx.commands.heater_power = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANUAL CONTROL: jog commands accepted by the service
// ═══════════════════════════════════════════════════════════════════════════

pub struct ManualControlState;

impl StateBehavior for ManualControlState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        ctx.heater_off();
        motion.enable_all(true);
        info!("MANUAL: motors enabled, jog allowed");
    }

    fn on_exit(&self, _ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        motion.enable_all(false);
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        ctx.commands.heater_power = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALIBRATION: home Z, X, Y one per tick, then settle
// ═══════════════════════════════════════════════════════════════════════════

pub struct CalibrationState;

impl StateBehavior for CalibrationState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        ctx.heater_off();
        hold_axes(motion);
        info!(
            "CALIBRATION: homing {} axes, timeout {} ms",
            AxisId::HOMING_ORDER.len(),
            ctx.config.calibration_timeout_ms
        );
    }

    fn on_tick(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        if ctx.exec.operation_complete {
            return;
        }
        if ctx.elapsed() > ctx.config.calibration_timeout_ms {
            ctx.fault(FaultCause::CalibrationTimeout, Event::CalibrationError);
            return;
        }

        let homed = ctx.exec.iteration_count as usize;
        if let Some(&id) = AxisId::HOMING_ORDER.get(homed) {
            let axis = motion.axis(id);
            axis.calibrate();
            if !axis.endpoint_triggered() {
                ctx.fault(FaultCause::NoEndpoint(id), Event::CalibrationError);
                return;
            }
            info!("CALIBRATION: {} homed", id.name());
            ctx.exec.iteration_count += 1;
            if ctx.exec.iteration_count as usize == AxisId::HOMING_ORDER.len() {
                ctx.exec.checkpoint_ms = Some(ctx.now_ms);
            }
            return;
        }

        if let Some(done_ms) = ctx.exec.checkpoint_ms {
            if ctx.now_ms.saturating_sub(done_ms) >= ctx.config.calibration_settle_ms {
                ctx.finish(Event::CalibrationSuccess);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY: calibrated, waiting for approval
// ═══════════════════════════════════════════════════════════════════════════

pub struct ReadyState;

impl StateBehavior for ReadyState {
    fn on_enter(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        ctx.heater_off();
        if ctx.staged.is_some() {
            info!("READY: job staged, waiting for approval");
        } else {
            info!("READY: calibration only, returning to idle");
        }
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        if ctx.staged.is_none() && !ctx.exec.operation_complete {
            ctx.finish(Event::CalibrationDone);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  HEATING: regulate up to the working temperature
// ═══════════════════════════════════════════════════════════════════════════

pub struct HeatingState;

impl StateBehavior for HeatingState {
    fn on_enter(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        let target = ctx.regulator.set_target(ctx.config.target_temperature_c);
        ctx.regulator.set_enabled(true);
        info!(
            "HEATING: target {:.1} °C, timeout {} ms",
            target, ctx.config.heating_timeout_ms
        );
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        if ctx.exec.operation_complete {
            ctx.commands.heater_power = 0;
            return;
        }

        let t = match ctx.temperature {
            Ok(t) => t,
            Err(fault) => {
                ctx.heater_off();
                ctx.fault(fault.into(), Event::HeatingError);
                return;
            }
        };
        if t > ctx.config.max_temperature_c {
            ctx.heater_off();
            ctx.fault(FaultCause::OverTemperature, Event::HeatingError);
            return;
        }

        ctx.commands.heater_power = ctx.regulator.update(t, ctx.now_ms);

        if (t - ctx.regulator.target()).abs() <= ctx.config.temperature_tolerance_c {
            let since = *ctx.exec.checkpoint_ms.get_or_insert(ctx.now_ms);
            if ctx.now_ms.saturating_sub(since) >= ctx.config.heat_soak_ms {
                info!("HEATING: {:.1} °C reached", t);
                ctx.finish(Event::HeatingSuccess);
                return;
            }
        } else {
            ctx.exec.checkpoint_ms = None;
        }

        if ctx.elapsed() > ctx.config.heating_timeout_ms {
            ctx.heater_off();
            ctx.fault(FaultCause::HeatingTimeout, Event::HeatingError);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  EXECUTING: regulate and run the job, one sub-machine step per tick
// ═══════════════════════════════════════════════════════════════════════════

pub struct ExecutingState;

impl StateBehavior for ExecutingState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        ctx.drifting = false;
        if ctx.job.is_some() {
            info!("EXECUTING: resuming job");
        } else if let Some(source) = ctx.staged.take() {
            ctx.job = Some(ExecutionSubMachine::new(
                ctx.config.execution,
                ctx.tick_ms(),
                source,
            ));
            info!("EXECUTING: job started");
        } else {
            ctx.fault(FaultCause::NoJob, Event::DataError);
            return;
        }
        hold_axes(motion);
    }

    fn on_exit(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        motion.axis(AxisId::Feed).enable(false);
        let now = ctx.now_ms;
        if let Some(job) = ctx.job.as_mut() {
            job.suspend(now);
        }
    }

    fn on_tick(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        if ctx.exec.operation_complete {
            return;
        }

        let t = match ctx.temperature {
            Ok(t) => t,
            Err(fault) => {
                ctx.heater_off();
                ctx.fault(fault.into(), Event::DataError);
                return;
            }
        };
        if t > ctx.config.max_temperature_c {
            ctx.heater_off();
            ctx.fault(FaultCause::OverTemperature, Event::HeatingError);
            return;
        }

        ctx.commands.heater_power = ctx.regulator.update(t, ctx.now_ms);

        let deviation = (t - ctx.regulator.target()).abs();
        if deviation > ctx.config.drift_threshold_c {
            if !ctx.drifting {
                warn!(
                    "EXECUTING: temperature drift {:.1} °C (reading {:.1} °C)",
                    deviation, t
                );
                ctx.drifting = true;
            }
        } else {
            ctx.drifting = false;
        }

        let now = ctx.now_ms;
        let result = match ctx.job.as_mut() {
            Some(job) => job.step(motion, now),
            None => {
                ctx.fault(FaultCause::NoJob, Event::DataError);
                return;
            }
        };
        match result {
            Ok(ExecSubState::Complete) => ctx.finish(Event::TaskDone),
            Ok(_) => {}
            Err(fault) => {
                motion.axis(AxisId::Feed).enable(false);
                ctx.fault(fault.into(), Event::DataError);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAUSED: heater off, axes held, job retained
// ═══════════════════════════════════════════════════════════════════════════

pub struct PausedState;

impl StateBehavior for PausedState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        ctx.heater_off();
        hold_axes(motion);
        info!("PAUSED: job held");
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        ctx.commands.heater_power = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  NORMAL EXIT: cool down to a safe temperature
// ═══════════════════════════════════════════════════════════════════════════

pub struct NormalExitState;

impl StateBehavior for NormalExitState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        all_off(ctx, motion);
        if let Some(job) = ctx.job.take() {
            info!(
                "NORMAL_EXIT: job closed after {} point(s)",
                job.completed_count()
            );
        }
        ctx.staged = None;
        info!(
            "NORMAL_EXIT: cooling below {:.1} °C",
            ctx.config.safe_temperature_c
        );
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        ctx.commands.heater_power = 0;
        if ctx.exec.operation_complete {
            return;
        }
        match ctx.temperature {
            Err(fault) => ctx.fault(fault.into(), Event::CoolingError),
            Ok(t) if t <= ctx.config.safe_temperature_c => ctx.finish(Event::CooldownComplete),
            Ok(_) => {
                if ctx.elapsed() > ctx.config.cooldown_timeout_ms {
                    ctx.fault(FaultCause::CooldownTimeout, Event::CoolingError);
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR STATES: everything off; a second fault locks the machine
// ═══════════════════════════════════════════════════════════════════════════

/// Shared behaviour of the three error states, parameterised by the event
/// that sends each one to Locked.
pub struct ErrorState {
    event: Event,
}

impl ErrorState {
    pub const CALIBRATION: Self = Self {
        event: Event::CalibrationError,
    };
    pub const HEATING: Self = Self {
        event: Event::HeatingError,
    };
    pub const DATA: Self = Self {
        event: Event::DataError,
    };
}

impl StateBehavior for ErrorState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        all_off(ctx, motion);
        ctx.job = None;
        warn!("{}: heater and motors disabled", ctx.state);
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        ctx.commands.heater_power = 0;
        if ctx.exec.operation_complete {
            return;
        }
        match ctx.temperature {
            // Still above the ceiling long after the heater was cut:
            // the power stage is not obeying.
            Ok(t) if t > ctx.config.max_temperature_c
                && ctx.elapsed() > ctx.config.heating_timeout_ms =>
            {
                ctx.fault(FaultCause::OverTemperature, self.event);
            }
            Err(fault) if self.event == Event::DataError => {
                ctx.fault(fault.into(), self.event);
            }
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  LOCKED: terminal until reset
// ═══════════════════════════════════════════════════════════════════════════

pub struct LockedState;

impl StateBehavior for LockedState {
    fn on_enter(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        all_off(ctx, motion);
        ctx.job = None;
        ctx.staged = None;
        warn!("LOCKED: machine locked, reset required");
    }

    fn on_tick(&self, ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {
        ctx.commands.heater_power = 0;
    }
}
