//! MAX6675 K-type thermocouple amplifier.
//!
//! Read-only SPI, bit-banged on three GPIOs.  One conversion is a 16-bit
//! frame, MSB first:
//!
//! ```text
//!  15   14 ........ 3   2    1    0
//! [ 0 ][ temp, 0.25 °C ][OC][ID][ 0 ]
//! ```
//!
//! Bit 2 set means the thermocouple input is open.  The chip needs about
//! 220 ms per conversion; reading faster returns the previous result and
//! restarts the conversion, so the driver caches the last reading and
//! only clocks the bus every `MIN_READ_INTERVAL_MS`.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-bangs SCK/CS/SO via hw_init.
//! On host/test: reads the raw frame from a static AtomicU32 for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use log::warn;

use crate::drivers::hw_init;
use crate::error::SensorFault;

/// Conversion time of the MAX6675 plus margin.
pub const MIN_READ_INTERVAL_MS: u64 = 250;

/// Top of the MAX6675's 12-bit range.
pub const MAX_READING_C: f64 = 1023.75;

const OPEN_CIRCUIT_BIT: u16 = 1 << 2;
const DUMMY_SIGN_BIT: u16 = 1 << 15;
const CELSIUS_PER_LSB: f64 = 0.25;

/// Frame the simulated sensor returns; 25 °C until a test changes it.
#[cfg(not(target_os = "espidf"))]
static SIM_FRAME: AtomicU32 = AtomicU32::new(encode_frame(25.0) as u32);

/// Host only: inject a raw frame.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_frame(frame: u16) {
    SIM_FRAME.store(frame as u32, Ordering::Relaxed);
}

/// Host only: inject a temperature.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temperature(celsius: f64) {
    sim_set_frame(encode_frame(celsius));
}

/// Frame the chip would send for `celsius`.
pub const fn encode_frame(celsius: f64) -> u16 {
    let counts = (celsius / CELSIUS_PER_LSB) as u16;
    (counts & 0x0FFF) << 3
}

/// Decode one raw frame.
pub fn decode_frame(frame: u16) -> Result<f64, SensorFault> {
    // A floating SO line reads all ones; the dummy bit is never set by a
    // real chip.
    if frame & DUMMY_SIGN_BIT != 0 {
        return Err(SensorFault::ReadFailed);
    }
    if frame & OPEN_CIRCUIT_BIT != 0 {
        return Err(SensorFault::OpenCircuit);
    }
    let celsius = f64::from(frame >> 3) * CELSIUS_PER_LSB;
    if !(0.0..=MAX_READING_C).contains(&celsius) {
        return Err(SensorFault::OutOfRange);
    }
    Ok(celsius)
}

pub struct Thermocouple<D: DelayNs> {
    sck: i32,
    cs: i32,
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    so: i32,
    delay: D,
    last: Result<f64, SensorFault>,
    last_read_ms: Option<u64>,
}

impl<D: DelayNs> Thermocouple<D> {
    pub fn new(sck: i32, cs: i32, so: i32, delay: D) -> Self {
        Self {
            sck,
            cs,
            so,
            delay,
            last: Err(SensorFault::ReadFailed),
            last_read_ms: None,
        }
    }

    /// Latest reading, clocking a new frame if the conversion interval
    /// has passed.
    pub fn read(&mut self, now_ms: u64) -> Result<f64, SensorFault> {
        let due = self
            .last_read_ms
            .is_none_or(|at| now_ms.saturating_sub(at) >= MIN_READ_INTERVAL_MS);
        if due {
            let result = decode_frame(self.read_frame());
            if let (Ok(_), Err(fault)) = (self.last, result) {
                warn!("Thermocouple: {}", fault);
            }
            self.last = result;
            self.last_read_ms = Some(now_ms);
        }
        self.last
    }

    pub fn last(&self) -> Result<f64, SensorFault> {
        self.last
    }

    #[cfg(target_os = "espidf")]
    fn read_frame(&mut self) -> u16 {
        hw_init::gpio_write(self.cs, false);
        self.delay.delay_us(1);
        let mut frame = 0u16;
        for _ in 0..16 {
            hw_init::gpio_write(self.sck, true);
            self.delay.delay_us(1);
            frame = (frame << 1) | u16::from(hw_init::gpio_read(self.so));
            hw_init::gpio_write(self.sck, false);
            self.delay.delay_us(1);
        }
        hw_init::gpio_write(self.cs, true);
        frame
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_frame(&mut self) -> u16 {
        hw_init::gpio_write(self.cs, false);
        self.delay.delay_us(1);
        hw_init::gpio_write(self.sck, false);
        hw_init::gpio_write(self.cs, true);
        SIM_FRAME.load(Ordering::Relaxed) as u16
    }
}
