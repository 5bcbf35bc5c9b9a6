//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (web UI, serial
//! console, drill import) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.  Supervisory flow (start a task, pause,
//! cancel) goes through the event queue instead.

use crate::app::ports::AxisId;
use crate::config::SystemConfig;
use crate::control::PidConstants;
use crate::execution::SolderPoint;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Stage a point-table job.  Idle only.
    StagePoints(Vec<SolderPoint>),

    /// Stage a program job from raw bytes.  Idle only.
    StageProgram(Vec<u8>),

    /// Move one axis by a relative step count.  ManualControl only.
    Jog { axis: AxisId, steps: i32 },

    /// Leave an error state or Locked.
    Reset,

    ResetStatistics,

    /// Retune the regulator.
    SetPidConstants(PidConstants),

    /// Replace the configuration.  Validated first.
    UpdateConfig(SystemConfig),
}
