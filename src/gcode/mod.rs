//! Restricted G-code dialect.
//!
//! ```text
//!   bytes ──▶ ProgramParser ──▶ Command ──▶ CommandExecutor ──▶ Plan
//!             (line cursor,     (one line)   (Z discipline,      (MotionSteps for
//!              validation)                    unit conversion)    the sub-machine)
//! ```
//!
//! Accepted lines:
//!
//! | Line                         | Result                     |
//! |------------------------------|----------------------------|
//! | `G0 [X..] [Y..] [Z..] [F..]` | `Move`                     |
//! | `S[<uint>]`                  | `FeedSolder`               |
//! | `G1`, `G4`, `G28`, `M1xx`    | dropped (system-managed)   |
//! | blank / `; comment`          | ignored                    |
//! | anything else                | parse failure, line skipped|

pub mod executor;
pub mod parser;

pub use executor::CommandExecutor;
pub use parser::{ParseError, ProgramParser, ValidationError, parse_line, validate};

/// What a command asks the machine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Move,
    FeedSolder,
    SetTemperature,
    Home,
    Dwell,
    Unknown,
}

/// One parsed program line.  Absent fields mean "unchanged".
///
/// Units: `x`/`y` in millimetres, `f` in mm/min, `s` in tenths of a
/// millimetre of solder wire, `t` in seconds (Dwell) or °C
/// (SetTemperature).  `z` only marks a solder point; its value is not
/// used as a height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub f: Option<f64>,
    pub s: Option<u32>,
    pub t: Option<f64>,
    /// 1-based source line, 0 when built in code.
    pub line: u32,
}

impl Command {
    pub const fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            x: None,
            y: None,
            z: None,
            f: None,
            s: None,
            t: None,
            line: 0,
        }
    }

    pub fn with_x(mut self, x: f64) -> Self {
        self.x = Some(x);
        self
    }

    pub fn with_y(mut self, y: f64) -> Self {
        self.y = Some(y);
        self
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn with_f(mut self, f: f64) -> Self {
        self.f = Some(f);
        self
    }

    pub fn with_s(mut self, s: u32) -> Self {
        self.s = Some(s);
        self
    }

    pub fn with_t(mut self, t: f64) -> Self {
        self.t = Some(t);
        self
    }

    /// At least one of X/Y/Z is present.
    pub fn has_axis(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }

    /// A Move carrying Z: travel, then lower the tip onto the pad.
    pub fn is_solder_point(&self) -> bool {
        self.kind == CommandKind::Move && self.z.is_some()
    }
}
