//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions and LEDC timers/channels using raw ESP-IDF
//! sys calls. Called once from `main()` before the control loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use embedded_hal::delay::DelayNs;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

/// Endpoint switches close to GND; the MAX6675 SO line floats high when
/// the chip is missing, which decodes as a read failure.
#[cfg(target_os = "espidf")]
const INPUT_PINS: [i32; 4] = [
    pins::X_ENDPOINT_GPIO,
    pins::Y_ENDPOINT_GPIO,
    pins::Z_ENDPOINT_GPIO,
    pins::TC_SO_GPIO,
];

/// One `gpio_config` call for every pin in `mask`.
#[cfg(target_os = "espidf")]
unsafe fn configure(mask: u64, mode: gpio_mode_t, pull_up: bool) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: mask,
        mode,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let rc = unsafe { gpio_config(&cfg) };
    if rc == ESP_OK as i32 { Ok(()) } else { Err(HwInitError::GpioConfigFailed(rc)) }
}

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let mask = INPUT_PINS.iter().fold(0u64, |m, &pin| m | (1u64 << pin));
    unsafe { configure(mask, gpio_mode_t_GPIO_MODE_INPUT, true)? };
    info!("hw_init: {} inputs configured (endpoints, thermocouple SO)", INPUT_PINS.len());
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

/// Output pins and their idle level.  ENABLE lines idle high (drivers off),
/// thermocouple CS idles high (deselected).
#[cfg(target_os = "espidf")]
const OUTPUT_PINS: [(i32, u32); 14] = [
    (pins::X_STEP_GPIO, 0),
    (pins::X_DIR_GPIO, 0),
    (pins::X_ENABLE_GPIO, 1),
    (pins::Y_STEP_GPIO, 0),
    (pins::Y_DIR_GPIO, 0),
    (pins::Y_ENABLE_GPIO, 1),
    (pins::Z_STEP_GPIO, 0),
    (pins::Z_DIR_GPIO, 0),
    (pins::Z_ENABLE_GPIO, 1),
    (pins::FEED_STEP_GPIO, 0),
    (pins::FEED_DIR_GPIO, 0),
    (pins::FEED_ENABLE_GPIO, 1),
    (pins::TC_SCK_GPIO, 0),
    (pins::TC_CS_GPIO, 1),
];

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    // Latch idle levels first so the drivers never see a glitch when the
    // pins switch to output.
    for &(pin, idle) in &OUTPUT_PINS {
        unsafe { gpio_set_level(pin, idle) };
    }
    let mask = OUTPUT_PINS.iter().fold(0u64, |m, &(pin, _)| m | (1u64 << pin));
    unsafe { configure(mask, gpio_mode_t_GPIO_MODE_OUTPUT, false)? };
    info!("hw_init: {} outputs configured (4 axes, thermocouple SPI)", OUTPUT_PINS.len());
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_gpio_outputs(). Main-loop only.
    unsafe { gpio_set_level(pin, if high { 1 } else { 0 }); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── LEDC PWM ─────────────────────────────────────────────────

pub const LEDC_CH_HEATER: u32 = 0;
pub const LEDC_CH_LED_R: u32 = 1;
pub const LEDC_CH_LED_G: u32 = 2;
pub const LEDC_CH_LED_B: u32 = 3;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let check = |ret: i32| {
        if ret == ESP_OK as i32 { Ok(()) } else { Err(HwInitError::LedcInitFailed(ret)) }
    };

    // Timer 0: heater (1 kHz, 8-bit)
    // SAFETY: Called from single main-task context via init_peripherals().
    check(unsafe { ledc_timer_config(&ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::HEATER_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    }) })?;

    // Timer 1: status LED (1 kHz, 8-bit)
    check(unsafe { ledc_timer_config(&ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_1,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::LED_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    }) })?;

    // Channel 0: heater, starts at zero duty
    check(unsafe { ledc_channel_config(&ledc_channel_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        channel: ledc_channel_t_LEDC_CHANNEL_0,
        timer_sel: ledc_timer_t_LEDC_TIMER_0,
        gpio_num: pins::HEATER_PWM_GPIO,
        duty: 0,
        hpoint: 0,
        ..Default::default()
    }) })?;

    // Channels 1-3: RGB LED
    let led_gpios = [pins::LED_R_GPIO, pins::LED_G_GPIO, pins::LED_B_GPIO];
    for (i, &gpio) in led_gpios.iter().enumerate() {
        check(unsafe { ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: ledc_channel_t_LEDC_CHANNEL_1 + i as u32,
            timer_sel: ledc_timer_t_LEDC_TIMER_1,
            gpio_num: gpio,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        }) })?;
    }

    info!("hw_init: LEDC configured (heater=CH0, led=CH1-3)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: LEDC channels were configured in init_ledc(); duty register
    // writes are race-free since only main loop calls this function.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty as u32);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}

// ── Busy-wait delay ───────────────────────────────────────────

/// Microsecond busy-wait for step pulses and SPI clocking.
///
/// ROM delay on device, no-op on host so simulated motion runs at full speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseDelay;

impl DelayNs for PulseDelay {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        // SAFETY: esp_rom_delay_us is a pure busy loop.
        unsafe { esp_rom_delay_us(ns.div_ceil(1_000)) };
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, _ns: u32) {}

    #[cfg(target_os = "espidf")]
    fn delay_us(&mut self, us: u32) {
        // SAFETY: see delay_ns.
        unsafe { esp_rom_delay_us(us) };
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_us(&mut self, _us: u32) {}
}
