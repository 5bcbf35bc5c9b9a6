//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A web UI or display adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::{AppEvent, TelemetryData};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink {
    /// Telemetry is emitted as one JSON object per line instead of the
    /// human-readable form.
    json_telemetry: bool,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json_telemetry(mut self, enabled: bool) -> Self {
        self.json_telemetry = enabled;
        self
    }

    fn telemetry(&self, t: &TelemetryData) {
        if self.json_telemetry {
            match serde_json::to_string(t) {
                Ok(line) => info!("TELEM {}", line),
                Err(e) => warn!("TELEM | serialize failed: {}", e),
            }
            return;
        }
        let temperature = match t.temperature_c {
            Some(c) => format!("{:.1}", c),
            None => "--".into(),
        };
        info!(
            "TELEM | state={} ({:?}) for {}ms | T={}/{:.0}\u{00b0}C heater={}% | \
             exec={:?} points={} | errors={} jobs={} | heap={}",
            t.state,
            t.color,
            t.time_in_state_ms,
            temperature,
            t.target_c,
            t.heater_power,
            t.exec_state,
            t.points_completed,
            t.error_count,
            t.task_completed_count,
            t.heap_free,
        );
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => self.telemetry(t),
            AppEvent::StateChanged { from, to, event } => {
                info!("STATE | {} -> {} on {}", from, to, event.name());
            }
            AppEvent::TransitionRejected { state, event } => {
                warn!("STATE | {} ignored in {}", event.name(), state);
            }
            AppEvent::Fault(record) => {
                warn!(
                    "FAULT | {} in {} at {}ms",
                    record.cause, record.state, record.at_ms
                );
            }
            AppEvent::JobCompleted { total } => {
                info!("JOB | completed (total {})", total);
            }
            AppEvent::Reset { from } => {
                info!("RESET | from {}", from);
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
        }
    }
}
