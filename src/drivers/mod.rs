//! Actuator and sensor drivers, hardware initialisation, and peripheral helpers.

pub mod heater;
pub mod hw_init;
pub mod status_led;
pub mod stepper;
pub mod thermocouple;
pub mod watchdog;
