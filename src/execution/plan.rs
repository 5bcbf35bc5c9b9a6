//! Motion steps: the unit of work the sub-machine runs across ticks.
//!
//! A point or a program command expands into a short [`Plan`] of steps.
//! Each step issues its targets once, then advances the axes a bounded
//! number of steps per tick until it is done.

use heapless::Deque;

use super::{ExecSubState, SolderPoint};
use crate::config::ExecutionConfig;

/// Longest expansion of a single point or command.
pub const PLAN_CAPACITY: usize = 4;

pub type Plan = Deque<MotionStep, PLAN_CAPACITY>;

/// Append `step`.  Every expansion fits in `PLAN_CAPACITY`.
pub fn push(plan: &mut Plan, step: MotionStep) {
    let pushed = plan.push_back(step);
    debug_assert!(pushed.is_ok(), "plan over capacity, {step:?} dropped");
}

/// Feeder steps for a wire length, saturating at what an axis position
/// can hold.
fn feed_steps_for(length_mm: f64, config: &ExecutionConfig) -> u32 {
    let steps = (length_mm * config.feed_steps_per_mm).round().max(0.0);
    steps.min(f64::from(i32::MAX)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStep {
    /// XY travel with Z held at safe height.  `None` keeps that axis' target.
    Travel {
        x: Option<i32>,
        y: Option<i32>,
        steps_per_tick: u32,
    },
    /// Z down to soldering height.
    Lower,
    /// Timed wire feed.  Ends when `duration_ms` has elapsed, whether or
    /// not the feeder reached `feed_steps`.
    Feed { feed_steps: u32, duration_ms: u64 },
    /// Z up to safe height.
    Raise,
    /// Wait without moving.
    Dwell { duration_ms: u64 },
    /// Re-home every axis, one per tick, then zero the targets.
    Home,
    /// Z to home height, then XY to home.
    ReturnHome,
}

impl MotionStep {
    /// Sub-state reported while this step runs.  `None` leaves the
    /// previous report unchanged.
    pub fn sub_state(self) -> Option<ExecSubState> {
        match self {
            Self::Travel { .. } => Some(ExecSubState::MoveToPoint),
            Self::Lower => Some(ExecSubState::MoveDown),
            Self::Feed { .. } => Some(ExecSubState::Soldering),
            Self::Raise => Some(ExecSubState::MoveUp),
            Self::Home | Self::ReturnHome => Some(ExecSubState::ReturnHome),
            Self::Dwell { .. } => None,
        }
    }
}

/// Wire length (mm) to feeder steps and feed duration.
pub fn feed_for_length(length_mm: f64, config: &ExecutionConfig) -> MotionStep {
    let feed_steps = feed_steps_for(length_mm, config);
    let duration_ms = (length_mm / config.feed_rate_mm_per_s * 1000.0).round().max(1.0) as u64;
    MotionStep::Feed {
        feed_steps,
        duration_ms,
    }
}

/// Expand a fixed-table point.  The feed length follows from the point's
/// duration and the configured feed rate.
pub fn plan_point(point: &SolderPoint, config: &ExecutionConfig) -> Plan {
    let mut plan = Plan::new();
    let travel = MotionStep::Travel {
        x: Some(point.x),
        y: Some(point.y),
        steps_per_tick: config.max_steps_per_tick,
    };
    push(&mut plan, travel);
    if point.solder {
        let length_mm = config.feed_rate_mm_per_s * point.solder_duration_ms as f64 / 1000.0;
        let feed_steps = feed_steps_for(length_mm, config);
        push(&mut plan, MotionStep::Lower);
        push(&mut plan, MotionStep::Feed {
            feed_steps,
            duration_ms: point.solder_duration_ms,
        });
        push(&mut plan, MotionStep::Raise);
    }
    plan
}
