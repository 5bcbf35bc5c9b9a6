//! GPIO / peripheral pin assignments for the soldering station controller.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Stepper axes (step/dir drivers, ENABLE active low)
// ---------------------------------------------------------------------------

pub const X_STEP_GPIO: i32 = 1;
pub const X_DIR_GPIO: i32 = 2;
pub const X_ENABLE_GPIO: i32 = 3;

pub const Y_STEP_GPIO: i32 = 4;
pub const Y_DIR_GPIO: i32 = 5;
pub const Y_ENABLE_GPIO: i32 = 6;

pub const Z_STEP_GPIO: i32 = 7;
pub const Z_DIR_GPIO: i32 = 15;
pub const Z_ENABLE_GPIO: i32 = 16;

/// Solder wire feeder.  No endpoint switch.
pub const FEED_STEP_GPIO: i32 = 17;
pub const FEED_DIR_GPIO: i32 = 18;
pub const FEED_ENABLE_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// Endpoint switches (normally open to GND, internal pull-up)
// ---------------------------------------------------------------------------

pub const X_ENDPOINT_GPIO: i32 = 9;
pub const Y_ENDPOINT_GPIO: i32 = 10;
pub const Z_ENDPOINT_GPIO: i32 = 11;

// ---------------------------------------------------------------------------
// Iron heater (logic-level MOSFET, LEDC PWM)
// ---------------------------------------------------------------------------

pub const HEATER_PWM_GPIO: i32 = 12;
/// Slow PWM; the element's thermal mass filters it.
pub const HEATER_PWM_FREQ_HZ: u32 = 1_000;

// ---------------------------------------------------------------------------
// Thermocouple amplifier (MAX6675, bit-banged SPI, read only)
// ---------------------------------------------------------------------------

pub const TC_SCK_GPIO: i32 = 13;
pub const TC_CS_GPIO: i32 = 14;
pub const TC_SO_GPIO: i32 = 21;

// ---------------------------------------------------------------------------
// Status LED (discrete RGB, LEDC PWM)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 38;
pub const LED_G_GPIO: i32 = 39;
pub const LED_B_GPIO: i32 = 40;
pub const LED_PWM_FREQ_HZ: u32 = 1_000;
