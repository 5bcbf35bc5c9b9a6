//! The transition table.
//!
//! A flat `(from, event, to)` list searched linearly.  A pair with no row
//! is rejected by the engine; it never changes state.

use super::SystemState::{self, *};
use crate::events::Event;

/// One row of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SystemState,
    pub event: Event,
    pub to: SystemState,
}

const fn row(from: SystemState, event: Event, to: SystemState) -> Transition {
    Transition { from, event, to }
}

pub const TRANSITIONS: &[Transition] = &[
    row(Init, Event::InitDone, Idle),
    // Idle
    row(Idle, Event::SelectManual, ManualControl),
    row(Idle, Event::TaskSent, Calibration),
    row(Idle, Event::RequestCalibration, Calibration),
    row(ManualControl, Event::ExitManual, Idle),
    // Calibration
    row(Calibration, Event::CalibrationSuccess, Ready),
    row(Calibration, Event::CalibrationError, CalibrationError),
    row(Calibration, Event::CancelTask, Idle),
    // Ready
    row(Ready, Event::CancelTask, Idle),
    row(Ready, Event::CalibrationDone, Idle),
    row(Ready, Event::TaskApproved, Heating),
    // Heating
    row(Heating, Event::HeatingSuccess, Executing),
    row(Heating, Event::HeatingError, HeatingError),
    row(Heating, Event::CancelTask, NormalExit),
    row(Heating, Event::ExitRequest, NormalExit),
    // Executing
    row(Executing, Event::PauseRequest, Paused),
    row(Executing, Event::TaskDone, NormalExit),
    row(Executing, Event::HeatingError, HeatingError),
    row(Executing, Event::DataError, DataError),
    row(Executing, Event::CancelTask, NormalExit),
    row(Executing, Event::ExitRequest, NormalExit),
    // Paused
    row(Paused, Event::ExitRequest, NormalExit),
    row(Paused, Event::CancelTask, NormalExit),
    row(Paused, Event::ContinueTask, Heating),
    // NormalExit
    row(NormalExit, Event::CooldownComplete, Idle),
    row(NormalExit, Event::CoolingError, HeatingError),
    // Second fault locks the machine
    row(CalibrationError, Event::CalibrationError, Locked),
    row(HeatingError, Event::HeatingError, Locked),
    row(DataError, Event::DataError, Locked),
];

/// Target state for `event` in `state`, if the table has a row for it.
pub fn next_state(state: SystemState, event: Event) -> Option<SystemState> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == state && t.event == event)
        .map(|t| t.to)
}
