//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `hardware`     | MotionPort         | Step/dir drivers, endpoints  |
//! |                | HeaterPort         | ESP32 LEDC PWM               |
//! |                | TemperaturePort    | MAX6675 thermocouple         |
//! | `log_sink`     | EventSink          | Serial log output            |
//! | `time`         | ClockPort          | ESP32 system timer           |

pub mod hardware;
pub mod log_sink;
pub mod time;
