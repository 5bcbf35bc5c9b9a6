//! Event-driven supervisory state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  tick()                                                      │
//! │   1. pop ≤ 1 event from the queue                            │
//! │   2. next_state(current, event)                              │
//! │        hit  → on_exit(current) → stats → on_enter(next)      │
//! │        miss → warn, count, stay                              │
//! │   3. on_tick(current)                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-state actions live in [`states`], one [`StateBehavior`] per state,
//! dispatched through [`SystemState::behavior`].  All handlers receive the
//! shared [`FsmContext`] blackboard and the machine's motion port.  They
//! never transition directly: they raise events into the queue, and the
//! next tick performs the transition.

pub mod context;
pub mod states;
pub mod transitions;

use context::FsmContext;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::MotionPort;
use crate::events::Event;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every supervisory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SystemState {
    Init = 0,
    Idle = 1,
    ManualControl = 2,
    Calibration = 3,
    Ready = 4,
    Heating = 5,
    Executing = 6,
    Paused = 7,
    NormalExit = 8,
    CalibrationError = 9,
    HeatingError = 10,
    DataError = 11,
    Locked = 12,
}

/// Display category of a state, for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateColor {
    Ash,
    Yellow,
    Green,
    Red,
    Other,
}

impl SystemState {
    /// Total number of states, used to size per-state tables.
    pub const COUNT: usize = 13;

    pub const ALL: [SystemState; Self::COUNT] = [
        Self::Init,
        Self::Idle,
        Self::ManualControl,
        Self::Calibration,
        Self::Ready,
        Self::Heating,
        Self::Executing,
        Self::Paused,
        Self::NormalExit,
        Self::CalibrationError,
        Self::HeatingError,
        Self::DataError,
        Self::Locked,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Idle => "Idle",
            Self::ManualControl => "ManualControl",
            Self::Calibration => "Calibration",
            Self::Ready => "Ready",
            Self::Heating => "Heating",
            Self::Executing => "Executing",
            Self::Paused => "Paused",
            Self::NormalExit => "NormalExit",
            Self::CalibrationError => "CalibrationError",
            Self::HeatingError => "HeatingError",
            Self::DataError => "DataError",
            Self::Locked => "Locked",
        }
    }

    pub fn color(self) -> StateColor {
        match self {
            Self::Init => StateColor::Ash,
            Self::Idle | Self::Ready | Self::Paused | Self::Locked => StateColor::Yellow,
            Self::Calibration | Self::Heating | Self::Executing | Self::NormalExit => {
                StateColor::Green
            }
            Self::CalibrationError | Self::HeatingError | Self::DataError => StateColor::Red,
            Self::ManualControl => StateColor::Other,
        }
    }

    /// Error states and Locked.  Leaving them takes an explicit reset.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::CalibrationError | Self::HeatingError | Self::DataError | Self::Locked
        )
    }

    /// States in which the heater may be driven at all.
    pub fn heater_allowed(self) -> bool {
        matches!(self, Self::Heating | Self::Executing)
    }

    pub fn behavior(self) -> &'static dyn StateBehavior {
        use states::*;
        match self {
            Self::Init => &InitState,
            Self::Idle => &IdleState,
            Self::ManualControl => &ManualControlState,
            Self::Calibration => &CalibrationState,
            Self::Ready => &ReadyState,
            Self::Heating => &HeatingState,
            Self::Executing => &ExecutingState,
            Self::Paused => &PausedState,
            Self::NormalExit => &NormalExitState,
            Self::CalibrationError => &ErrorState::CALIBRATION,
            Self::HeatingError => &ErrorState::HEATING,
            Self::DataError => &ErrorState::DATA,
            Self::Locked => &LockedState,
        }
    }
}

impl core::fmt::Display for SystemState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// State behaviour
// ---------------------------------------------------------------------------

/// Actions of one state.  `on_enter`/`on_exit` run exactly once per
/// transition; `on_tick` runs every tick the state is current.
pub trait StateBehavior: Sync {
    fn on_enter(&self, _ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {}

    fn on_exit(&self, _ctx: &mut FsmContext, _motion: &mut dyn MotionPort) {}

    fn on_tick(&self, ctx: &mut FsmContext, motion: &mut dyn MotionPort);
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The machine is stopped; nothing ran.
    Stopped,
    /// No event was pending.
    Quiet,
    Transitioned {
        from: SystemState,
        to: SystemState,
        event: Event,
    },
    /// The event has no row for the current state and was discarded.
    Rejected { state: SystemState, event: Event },
}

/// The supervisory engine.  State-specific data lives in [`FsmContext`].
pub struct Fsm {
    current: SystemState,
    entered_ms: u64,
    /// A TaskDone led into the current NormalExit.
    task_done: bool,
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm {
    pub fn new() -> Self {
        Self {
            current: SystemState::Init,
            entered_ms: 0,
            task_done: false,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        info!("FSM starting in state: {}", self.current);
        self.entered_ms = ctx.now_ms;
        ctx.state = self.current;
        ctx.reset_execution();
        ctx.stats.record_enter(self.current, ctx.now_ms);
        self.current.behavior().on_enter(ctx, motion);
    }

    /// Advance by one tick.
    pub fn tick(&mut self, ctx: &mut FsmContext, motion: &mut dyn MotionPort) -> TickOutcome {
        if !ctx.queue().is_running() {
            return TickOutcome::Stopped;
        }

        let outcome = match ctx.queue().pop() {
            Some(event) => match transitions::next_state(self.current, event) {
                Some(next) => {
                    let from = self.current;
                    self.transition(next, event, ctx, motion);
                    TickOutcome::Transitioned {
                        from,
                        to: next,
                        event,
                    }
                }
                None => {
                    warn!("FSM: event {} rejected in state {}", event, self.current);
                    ctx.stats.invalid_transitions += 1;
                    TickOutcome::Rejected {
                        state: self.current,
                        event,
                    }
                }
            },
            None => TickOutcome::Quiet,
        };

        self.current.behavior().on_tick(ctx, motion);
        ctx.stats.events_dropped = ctx.queue().dropped();
        outcome
    }

    /// Jump to `next` outside the table.  Used only by the service reset.
    pub fn force_transition(
        &mut self,
        next: SystemState,
        ctx: &mut FsmContext,
        motion: &mut dyn MotionPort,
    ) {
        info!("FSM forced: {} -> {}", self.current, next);
        self.task_done = false;
        self.enter(next, ctx, motion);
    }

    pub fn current_state(&self) -> SystemState {
        self.current
    }

    /// Milliseconds since the current state was entered.
    pub fn time_in_state(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_ms)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(
        &mut self,
        next: SystemState,
        event: Event,
        ctx: &mut FsmContext,
        motion: &mut dyn MotionPort,
    ) {
        info!("FSM transition: {} -> {} ({})", self.current, next, event);

        if next.is_error() {
            ctx.stats.error_count += 1;
        }
        if self.current == SystemState::NormalExit && next == SystemState::Idle && self.task_done {
            ctx.stats.task_completed_count += 1;
        }
        self.task_done = event == Event::TaskDone;

        self.enter(next, ctx, motion);
    }

    fn enter(&mut self, next: SystemState, ctx: &mut FsmContext, motion: &mut dyn MotionPort) {
        self.current.behavior().on_exit(ctx, motion);
        ctx.stats
            .record_exit(self.current, ctx.now_ms.saturating_sub(self.entered_ms));

        self.current = next;
        self.entered_ms = ctx.now_ms;
        ctx.state = next;
        ctx.reset_execution();
        ctx.stats.record_enter(next, ctx.now_ms);

        self.current.behavior().on_enter(ctx, motion);
    }
}
