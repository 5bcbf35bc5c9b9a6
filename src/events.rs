//! Supervisory event queue.
//!
//! Events are produced by:
//! - the network/upload layer (TaskSent, TaskApproved, CancelTask, ...)
//! - UI buttons (PauseRequest, ContinueTask, ExitRequest, SelectManual)
//! - the platform bootstrap (InitDone)
//! - the state machine's own per-tick actions (timeouts, sensor faults,
//!   completion)
//!
//! Events are consumed by the control loop, at most one per tick, in
//! FIFO order.  Faults travel through the same queue as normal flow.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Upload task │────▶│              │     │              │
//! │ Buttons     │────▶│  EventQueue  │────▶│ Control loop │
//! │ Bootstrap   │────▶│  (bounded)   │     │ (consumer)   │
//! │ FSM actions │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Maximum number of pending events.
pub const EVENT_QUEUE_DEPTH: usize = 10;

/// Triggers understood by the supervisory state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    // ── Lifecycle ─────────────────────────────────────────
    InitDone,
    SelectManual,
    ExitManual,

    // ── Job flow ──────────────────────────────────────────
    TaskSent,
    RequestCalibration,
    CalibrationSuccess,
    /// Calibration finished with no job staged.
    CalibrationDone,
    CancelTask,
    TaskApproved,
    HeatingSuccess,
    PauseRequest,
    ContinueTask,
    TaskDone,
    ExitRequest,
    CooldownComplete,

    // ── Faults ────────────────────────────────────────────
    CalibrationError,
    HeatingError,
    DataError,
    CoolingError,
}

impl Event {
    pub const COUNT: usize = 19;

    pub const ALL: [Event; Self::COUNT] = [
        Self::InitDone,
        Self::SelectManual,
        Self::ExitManual,
        Self::TaskSent,
        Self::RequestCalibration,
        Self::CalibrationSuccess,
        Self::CalibrationDone,
        Self::CancelTask,
        Self::TaskApproved,
        Self::HeatingSuccess,
        Self::PauseRequest,
        Self::ContinueTask,
        Self::TaskDone,
        Self::ExitRequest,
        Self::CooldownComplete,
        Self::CalibrationError,
        Self::HeatingError,
        Self::DataError,
        Self::CoolingError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::InitDone => "InitDone",
            Self::SelectManual => "SelectManual",
            Self::ExitManual => "ExitManual",
            Self::TaskSent => "TaskSent",
            Self::RequestCalibration => "RequestCalibration",
            Self::CalibrationSuccess => "CalibrationSuccess",
            Self::CalibrationDone => "CalibrationDone",
            Self::CancelTask => "CancelTask",
            Self::TaskApproved => "TaskApproved",
            Self::HeatingSuccess => "HeatingSuccess",
            Self::PauseRequest => "PauseRequest",
            Self::ContinueTask => "ContinueTask",
            Self::TaskDone => "TaskDone",
            Self::ExitRequest => "ExitRequest",
            Self::CooldownComplete => "CooldownComplete",
            Self::CalibrationError => "CalibrationError",
            Self::HeatingError => "HeatingError",
            Self::DataError => "DataError",
            Self::CoolingError => "CoolingError",
        }
    }

    /// Fault events, as opposed to normal flow.
    pub fn is_fault(self) -> bool {
        matches!(
            self,
            Self::CalibrationError | Self::HeatingError | Self::DataError | Self::CoolingError
        )
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Bounded MPSC queue ────────────────────────────────────────
//
// Any task may post; only the control loop pops.  A full queue drops the
// *newest* event and counts the overflow.

/// Bounded FIFO shared between event producers and the control loop.
/// Wrap in an `Arc` to hand producers their own handle.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH>,
    running: AtomicBool,
    dropped: AtomicU32,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            running: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue `event`.  Returns `false` if the machine is not running or
    /// the queue is full (the event is discarded).
    pub fn post(&self, event: Event) -> bool {
        if !self.running.load(Ordering::Acquire) {
            debug!("Event {} refused: state machine not running", event);
            return false;
        }
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Event queue full, dropping {}", event);
                false
            }
        }
    }

    /// Take the oldest pending event.
    pub fn pop(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Discard every pending event.
    pub fn clear(&self) {
        self.channel.clear();
    }

    /// Number of events discarded because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn reset_dropped(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
