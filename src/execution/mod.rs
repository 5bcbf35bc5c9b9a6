//! Execution sub-machine: drives one soldering job, one bounded step per tick.
//!
//! ```text
//!  Idle ─▶ MoveToPoint ─▶ MoveDown ─▶ Soldering ─▶ MoveUp ─┐
//!              ▲                                           │
//!              └────────────── more points ◀───────────────┤
//!                                                          ▼
//!                                    Complete ◀── ReturnHome
//! ```
//!
//! The job source is either a fixed point table or a parsed program.
//! Either way the source is expanded into [`MotionStep`]s, and every call
//! to [`ExecutionSubMachine::step`] advances the active step by at most
//! `max_steps_per_tick` per axis before returning.
//!
//! Ordering guarantees:
//!
//! * XY only moves while the Z axis reports a clear (safe) height.
//! * The Z target is `soldering_z` only after XY reached the point.
//! * Soldering is timed from its first tick; the feeder is released when
//!   the duration elapses, reached or not.

pub mod plan;

use core::fmt;

use log::{info, warn};

use crate::app::ports::{AxisId, Direction, MotionPort};
use crate::config::ExecutionConfig;
use crate::error::ProgramError;
use crate::gcode::{CommandExecutor, ProgramParser};
use plan::{MotionStep, Plan, plan_point, push};

/// Ticks without movement towards a target before the axis counts as stalled.
pub const STALL_TICKS: u8 = 5;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExecSubState {
    Idle,
    MoveToPoint,
    MoveDown,
    Soldering,
    MoveUp,
    ReturnHome,
    Complete,
}

/// One pad to solder (or just visit).  Coordinates in machine steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SolderPoint {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub solder: bool,
    pub solder_duration_ms: u64,
}

impl SolderPoint {
    pub const fn new(x: i32, y: i32, z: i32, solder: bool, solder_duration_ms: u64) -> Self {
        Self {
            x,
            y,
            z,
            solder,
            solder_duration_ms,
        }
    }
}

/// Where the job's work comes from.
#[derive(Debug, Clone)]
pub enum ExecutionSource {
    Points { points: Vec<SolderPoint>, next: usize },
    Program(ProgramParser),
}

impl ExecutionSource {
    pub fn points(points: Vec<SolderPoint>) -> Self {
        Self::Points { points, next: 0 }
    }

    pub fn program(bytes: &[u8]) -> Result<Self, ProgramError> {
        Ok(Self::Program(ProgramParser::from_bytes(bytes)?))
    }
}

/// Current axis targets in machine steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisTargets {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub feed: i32,
}

/// A job could not continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFault {
    /// The axis made no progress towards its target.
    AxisStalled(AxisId),
    /// Homing finished without the endpoint switch reporting contact.
    HomingFailed(AxisId),
}

impl fmt::Display for JobFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AxisStalled(axis) => write!(f, "{} axis stalled", axis.name()),
            Self::HomingFailed(axis) => write!(f, "{} axis homing found no endpoint", axis.name()),
        }
    }
}

/// The step currently running, with its per-step scratch.
#[derive(Debug, Clone, Copy)]
struct ActiveStep {
    step: MotionStep,
    /// Targets have been issued.
    in_progress: bool,
    started_ms: u64,
    home_index: usize,
    /// Time already spent in a timed step when the job was suspended.
    suspended_elapsed_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Sub-machine
// ---------------------------------------------------------------------------

pub struct ExecutionSubMachine {
    config: ExecutionConfig,
    source: ExecutionSource,
    executor: CommandExecutor,
    plan: Plan,
    active: Option<ActiveStep>,
    state: ExecSubState,
    targets: AxisTargets,
    targets_synced: bool,
    returning_home: bool,
    completed: u32,
    stall_ticks: [u8; 4],
}

impl ExecutionSubMachine {
    pub fn new(config: ExecutionConfig, tick_ms: u32, source: ExecutionSource) -> Self {
        Self {
            config,
            source,
            executor: CommandExecutor::new(config, tick_ms),
            plan: Plan::new(),
            active: None,
            state: ExecSubState::Idle,
            targets: AxisTargets::default(),
            targets_synced: false,
            returning_home: false,
            completed: 0,
            stall_ticks: [0; 4],
        }
    }

    /// Point-table job.
    pub fn with_points(config: ExecutionConfig, tick_ms: u32, points: Vec<SolderPoint>) -> Self {
        Self::new(config, tick_ms, ExecutionSource::points(points))
    }

    /// Program job over a private copy of `bytes`.
    pub fn with_program(
        config: ExecutionConfig,
        tick_ms: u32,
        bytes: &[u8],
    ) -> Result<Self, ProgramError> {
        Ok(Self::new(config, tick_ms, ExecutionSource::program(bytes)?))
    }

    /// Replace the job with a point table and restart from Idle.
    pub fn load_points(&mut self, points: Vec<SolderPoint>) {
        self.restart(ExecutionSource::points(points));
    }

    /// Replace the job with a program and restart from Idle.
    pub fn load_program(&mut self, bytes: &[u8]) -> Result<(), ProgramError> {
        self.restart(ExecutionSource::program(bytes)?);
        Ok(())
    }

    pub fn state(&self) -> ExecSubState {
        self.state
    }

    /// Points soldered so far.
    pub fn completed_count(&self) -> u32 {
        self.completed
    }

    pub fn targets(&self) -> AxisTargets {
        self.targets
    }

    pub fn is_complete(&self) -> bool {
        self.state == ExecSubState::Complete
    }

    /// Freeze the wall-clock budget of a running Feed or Dwell.  The next
    /// `step` resumes the count from where it stopped, so time spent away
    /// from Executing never counts as contact time.
    pub fn suspend(&mut self, now_ms: u64) {
        if let Some(active) = self.active.as_mut() {
            if active.in_progress && active.suspended_elapsed_ms.is_none() {
                active.suspended_elapsed_ms = Some(now_ms.saturating_sub(active.started_ms));
            }
        }
    }

    /// Advance the job by one tick.
    pub fn step(
        &mut self,
        motion: &mut dyn MotionPort,
        now_ms: u64,
    ) -> Result<ExecSubState, JobFault> {
        if self.state == ExecSubState::Complete {
            return Ok(self.state);
        }
        if !self.targets_synced {
            self.sync_targets(motion);
        }

        let mut active = match self.active {
            Some(active) => active,
            None => match self.next_step() {
                Some(step) => {
                    if let Some(sub) = step.sub_state() {
                        self.set_state(sub);
                    }
                    ActiveStep {
                        step,
                        in_progress: false,
                        started_ms: now_ms,
                        home_index: 0,
                        suspended_elapsed_ms: None,
                    }
                }
                None => {
                    self.set_state(ExecSubState::Complete);
                    info!("Exec: job complete, {} point(s) soldered", self.completed);
                    return Ok(self.state);
                }
            },
        };

        if let Some(elapsed) = active.suspended_elapsed_ms.take() {
            active.started_ms = now_ms.saturating_sub(elapsed);
        }

        let done = self.run(&mut active, motion, now_ms)?;
        self.active = if done { None } else { Some(active) };
        Ok(self.state)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn restart(&mut self, source: ExecutionSource) {
        self.source = source;
        self.plan.clear();
        self.active = None;
        self.state = ExecSubState::Idle;
        self.targets_synced = false;
        self.returning_home = false;
        self.completed = 0;
        self.stall_ticks = [0; 4];
        self.executor.reset();
    }

    fn set_state(&mut self, next: ExecSubState) {
        if next != self.state {
            info!("Exec transition: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn sync_targets(&mut self, motion: &mut dyn MotionPort) {
        self.targets = AxisTargets {
            x: motion.axis(AxisId::X).position(),
            y: motion.axis(AxisId::Y).position(),
            z: motion.axis(AxisId::Z).position(),
            feed: motion.axis(AxisId::Feed).position(),
        };
        self.targets_synced = true;
    }

    /// Pop the next step, expanding the source when the plan runs dry.
    /// After the source is exhausted a single ReturnHome is issued.
    fn next_step(&mut self) -> Option<MotionStep> {
        if self.plan.is_empty() {
            self.refill();
        }
        if let Some(step) = self.plan.pop_front() {
            return Some(step);
        }
        if self.returning_home {
            return None;
        }
        self.returning_home = true;
        Some(MotionStep::ReturnHome)
    }

    fn refill(&mut self) {
        match &mut self.source {
            ExecutionSource::Points { points, next } => {
                if let Some(point) = points.get(*next) {
                    *next += 1;
                    self.plan = plan_point(point, &self.config);
                }
            }
            ExecutionSource::Program(parser) => {
                while let Some(cmd) = parser.next_command() {
                    let plan = self.executor.plan(&cmd);
                    if !plan.is_empty() {
                        self.plan = plan;
                        return;
                    }
                }
                if self.executor.is_lowered() {
                    // Program ended on a solder point without a feed.
                    push(&mut self.plan, MotionStep::Raise);
                    self.executor.reset();
                }
            }
        }
    }

    /// Run `active` for one tick.  Returns `true` once the step is done.
    fn run(
        &mut self,
        active: &mut ActiveStep,
        motion: &mut dyn MotionPort,
        now_ms: u64,
    ) -> Result<bool, JobFault> {
        let max = self.config.max_steps_per_tick;
        let first_tick = !active.in_progress;
        active.in_progress = true;

        match active.step {
            MotionStep::Travel {
                x,
                y,
                steps_per_tick,
            } => {
                if first_tick {
                    if let Some(x) = x {
                        self.targets.x = x;
                    }
                    if let Some(y) = y {
                        self.targets.y = y;
                    }
                    self.targets.z = self.config.safe_z;
                }
                let z_done = self.drive(motion, AxisId::Z, self.targets.z, max)?;
                if !self.config.z_is_clear(motion.axis(AxisId::Z).position()) {
                    return Ok(false);
                }
                let x_done = self.drive(motion, AxisId::X, self.targets.x, steps_per_tick)?;
                let y_done = self.drive(motion, AxisId::Y, self.targets.y, steps_per_tick)?;
                Ok(z_done && x_done && y_done)
            }
            MotionStep::Lower => {
                if first_tick {
                    self.targets.z = self.config.soldering_z;
                }
                self.drive(motion, AxisId::Z, self.targets.z, max)
            }
            MotionStep::Raise => {
                if first_tick {
                    self.targets.z = self.config.safe_z;
                }
                self.drive(motion, AxisId::Z, self.targets.z, max)
            }
            MotionStep::Feed {
                feed_steps,
                duration_ms,
            } => {
                let feeder = motion.axis(AxisId::Feed);
                if first_tick {
                    active.started_ms = now_ms;
                    let steps = i32::try_from(feed_steps).unwrap_or(i32::MAX);
                    self.targets.feed = feeder.position().saturating_add(steps);
                }
                // Re-enabled every tick: a pause releases the feeder.
                feeder.enable(true);
                if now_ms.saturating_sub(active.started_ms) >= duration_ms {
                    motion.axis(AxisId::Feed).enable(false);
                    self.stall_ticks[AxisId::Feed.index()] = 0;
                    self.completed += 1;
                    info!(
                        "Exec: point {} soldered ({} ms)",
                        self.completed,
                        now_ms.saturating_sub(active.started_ms)
                    );
                    return Ok(true);
                }
                self.drive(motion, AxisId::Feed, self.targets.feed, max)?;
                Ok(false)
            }
            MotionStep::Dwell { duration_ms } => {
                if first_tick {
                    active.started_ms = now_ms;
                }
                Ok(now_ms.saturating_sub(active.started_ms) >= duration_ms)
            }
            MotionStep::Home => {
                let Some(&id) = AxisId::HOMING_ORDER.get(active.home_index) else {
                    self.targets.x = 0;
                    self.targets.y = 0;
                    self.targets.z = 0;
                    return Ok(true);
                };
                let axis = motion.axis(id);
                axis.calibrate();
                if !axis.endpoint_triggered() {
                    return Err(JobFault::HomingFailed(id));
                }
                active.home_index += 1;
                Ok(false)
            }
            MotionStep::ReturnHome => {
                if first_tick {
                    self.targets.x = self.config.home_x;
                    self.targets.y = self.config.home_y;
                    self.targets.z = self.config.home_z;
                }
                let z_done = self.drive(motion, AxisId::Z, self.targets.z, max)?;
                if !self.config.z_is_clear(motion.axis(AxisId::Z).position()) {
                    return Ok(false);
                }
                let x_done = self.drive(motion, AxisId::X, self.targets.x, max)?;
                let y_done = self.drive(motion, AxisId::Y, self.targets.y, max)?;
                Ok(z_done && x_done && y_done)
            }
        }
    }

    /// Step one axis towards `target`.  Returns `true` when it is there.
    fn drive(
        &mut self,
        motion: &mut dyn MotionPort,
        id: AxisId,
        target: i32,
        max_steps: u32,
    ) -> Result<bool, JobFault> {
        let axis = motion.axis(id);
        let before = axis.position();
        if before == target {
            self.stall_ticks[id.index()] = 0;
            return Ok(true);
        }
        axis.set_direction(if target > before {
            Direction::Forward
        } else {
            Direction::Reverse
        });
        axis.step_toward(target, max_steps);
        let after = axis.position();

        let stall = &mut self.stall_ticks[id.index()];
        if after == before {
            *stall += 1;
            if *stall >= STALL_TICKS {
                warn!("Exec: {} axis stalled at {} (target {})", id.name(), after, target);
                return Err(JobFault::AxisStalled(id));
            }
        } else {
            *stall = 0;
        }
        Ok(after == target)
    }
}
