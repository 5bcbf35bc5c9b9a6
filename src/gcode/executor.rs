//! Command executor: maps one parsed command onto motion steps.
//!
//! The executor keeps the Z discipline for program mode.  It remembers
//! whether the last plan left the tip lowered, so that:
//!
//! * a Move always raises Z before any XY travel,
//! * a Move carrying Z travels at safe height, then lowers,
//! * a FeedSolder only happens with the tip lowered, and raises afterwards.

use log::{debug, info, warn};

use super::{Command, CommandKind};
use crate::config::ExecutionConfig;
use crate::execution::plan::{MotionStep, Plan, feed_for_length, push};

pub struct CommandExecutor {
    config: ExecutionConfig,
    tick_ms: u32,
    lowered: bool,
}

impl CommandExecutor {
    pub fn new(config: ExecutionConfig, tick_ms: u32) -> Self {
        Self {
            config,
            tick_ms,
            lowered: false,
        }
    }

    /// Whether the plans issued so far leave the tip at soldering height.
    pub fn is_lowered(&self) -> bool {
        self.lowered
    }

    /// Forget the tip height, for a fresh program.
    pub fn reset(&mut self) {
        self.lowered = false;
    }

    /// Expand `cmd`.  An empty plan means the command has no effect here.
    pub fn plan(&mut self, cmd: &Command) -> Plan {
        let mut plan = Plan::new();
        match cmd.kind {
            CommandKind::Move => {
                if self.lowered {
                    push(&mut plan, MotionStep::Raise);
                    self.lowered = false;
                }
                push(&mut plan, MotionStep::Travel {
                    x: cmd.x.map(|mm| mm_to_steps(mm, self.config.x_steps_per_mm)),
                    y: cmd.y.map(|mm| mm_to_steps(mm, self.config.y_steps_per_mm)),
                    steps_per_tick: self.steps_per_tick(cmd.f),
                });
                if cmd.is_solder_point() {
                    push(&mut plan, MotionStep::Lower);
                    self.lowered = true;
                }
            }
            CommandKind::FeedSolder => {
                let amount = cmd.s.unwrap_or(0);
                if !self.lowered {
                    warn!(
                        "line {}: S{} with the tip raised, skipped",
                        cmd.line, amount
                    );
                    return plan;
                }
                let length_mm = f64::from(amount) / 10.0;
                push(&mut plan, feed_for_length(length_mm, &self.config));
                push(&mut plan, MotionStep::Raise);
                self.lowered = false;
            }
            CommandKind::Home => {
                info!("line {}: homing all axes", cmd.line);
                push(&mut plan, MotionStep::Home);
                self.lowered = false;
            }
            CommandKind::Dwell => {
                let secs = cmd.t.unwrap_or(0.0).max(0.0);
                push(&mut plan, MotionStep::Dwell {
                    duration_ms: (secs * 1000.0).round() as u64,
                });
            }
            CommandKind::SetTemperature | CommandKind::Unknown => {
                debug!("line {}: {:?} ignored in program mode", cmd.line, cmd.kind);
            }
        }
        plan
    }

    /// Per-tick step budget for a commanded feed rate (mm/min).
    fn steps_per_tick(&self, feed_mm_per_min: Option<f64>) -> u32 {
        let max = self.config.max_steps_per_tick;
        let Some(f) = feed_mm_per_min else {
            return max;
        };
        let steps_per_mm = self.config.x_steps_per_mm.max(self.config.y_steps_per_mm);
        let per_tick = f / 60.0 * steps_per_mm * f64::from(self.tick_ms) / 1000.0;
        (per_tick.round() as u32).clamp(1, max)
    }
}

fn mm_to_steps(mm: f64, steps_per_mm: f64) -> i32 {
    (mm * steps_per_mm).round() as i32
}
