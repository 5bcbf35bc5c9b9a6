//! Line parser and program cursor.
//!
//! A bad line never aborts a program: it is logged, counted, and the
//! cursor moves on to the next one.

use core::fmt;

use log::{debug, warn};

use super::{Command, CommandKind};
use crate::error::ProgramError;

/// Amount used by a bare `S` line (tenths of a millimetre).
pub const DEFAULT_FEED_AMOUNT: u32 = 50;

/// Largest program the parser will take a copy of.
pub const MAX_PROGRAM_BYTES: usize = 64 * 1024;

/// Longest wire feed one `S` word may ask for: 100 mm, in tenths.
pub const MAX_FEED_TENTHS_MM: u32 = 1_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a line could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Command word is not part of the dialect.
    UnknownCommand,
    /// A character that cannot start a word.
    UnexpectedCharacter(char),
    /// Word value is missing or not a number of the right type.
    BadNumber(char),
    /// Same field given twice.
    DuplicateField(char),
    /// Field not allowed on this command.
    UnexpectedField(char),
    /// Line is not valid UTF-8.
    NotUtf8,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character '{c}'"),
            Self::BadNumber(c) => write!(f, "bad number for '{c}'"),
            Self::DuplicateField(c) => write!(f, "duplicate field '{c}'"),
            Self::UnexpectedField(c) => write!(f, "unexpected field '{c}'"),
            Self::NotUtf8 => write!(f, "not valid UTF-8"),
        }
    }
}

/// Why a parsed command is structurally unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Move without X, Y or Z.
    NoAxis,
    /// FeedSolder with a zero amount.
    ZeroFeed,
    /// FeedSolder longer than `MAX_FEED_TENTHS_MM`.
    FeedTooLong(u32),
    /// Coordinate or feed rate is not a finite number.
    NonFinite,
    /// Feed rate must be positive.
    BadFeedRate,
    /// Kind that the parser should have filtered already.
    NotExecutable(CommandKind),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAxis => write!(f, "move without axis"),
            Self::ZeroFeed => write!(f, "zero solder feed"),
            Self::FeedTooLong(n) => {
                write!(f, "solder feed S{n} exceeds S{MAX_FEED_TENTHS_MM}")
            }
            Self::NonFinite => write!(f, "non-finite value"),
            Self::BadFeedRate => write!(f, "feed rate must be > 0"),
            Self::NotExecutable(kind) => write!(f, "{kind:?} not accepted in programs"),
        }
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// One `<letter><number>` word.
struct Word<'a> {
    letter: char,
    value: &'a str,
}

/// Splits `G0 X10.5 Y-3` (whitespace optional) into words.
struct Words<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Words<'a> {
    type Item = Result<Word<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rest = self.rest.trim_start();
        let mut chars = self.rest.chars();
        let first = chars.next()?;
        if !first.is_ascii_alphabetic() {
            self.rest = "";
            return Some(Err(ParseError::UnexpectedCharacter(first)));
        }
        let after = chars.as_str().trim_start();
        let len = after
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
            .unwrap_or(after.len());
        let (value, rest) = after.split_at(len);
        self.rest = rest;
        Some(Ok(Word {
            letter: first.to_ascii_uppercase(),
            value,
        }))
    }
}

/// Parse one line.  `Ok(None)` for blank, comment-only and dropped lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let code = line.split(';').next().unwrap_or("").trim();
    let mut words = Words { rest: code };
    let Some(first) = words.next() else {
        return Ok(None);
    };
    let first = first?;

    match first.letter {
        'G' => {
            let code: u32 = first.value.parse().map_err(|_| ParseError::BadNumber('G'))?;
            match code {
                0 => parse_move(words).map(Some),
                1 | 4 | 28 => {
                    debug!("G{} dropped (system-managed)", code);
                    Ok(None)
                }
                _ => Err(ParseError::UnknownCommand),
            }
        }
        'M' => {
            let code: u32 = first.value.parse().map_err(|_| ParseError::BadNumber('M'))?;
            if (100..200).contains(&code) {
                debug!("M{} dropped (system-managed)", code);
                Ok(None)
            } else {
                Err(ParseError::UnknownCommand)
            }
        }
        'S' => {
            let amount = if first.value.is_empty() {
                DEFAULT_FEED_AMOUNT
            } else {
                first.value.parse().map_err(|_| ParseError::BadNumber('S'))?
            };
            if let Some(extra) = words.next() {
                let extra = extra?;
                return Err(ParseError::UnexpectedField(extra.letter));
            }
            Ok(Some(Command::new(CommandKind::FeedSolder).with_s(amount)))
        }
        _ => Err(ParseError::UnknownCommand),
    }
}

fn parse_move(words: Words<'_>) -> Result<Command, ParseError> {
    let mut cmd = Command::new(CommandKind::Move);
    for word in words {
        let word = word?;
        let slot = match word.letter {
            'X' => &mut cmd.x,
            'Y' => &mut cmd.y,
            'Z' => &mut cmd.z,
            'F' => &mut cmd.f,
            other => return Err(ParseError::UnexpectedField(other)),
        };
        if slot.is_some() {
            return Err(ParseError::DuplicateField(word.letter));
        }
        let value: f64 = word
            .value
            .parse()
            .map_err(|_| ParseError::BadNumber(word.letter))?;
        *slot = Some(value);
    }
    Ok(cmd)
}

/// Structural checks applied before a command reaches the executor.
pub fn validate(cmd: &Command) -> Result<(), ValidationError> {
    match cmd.kind {
        CommandKind::Move => {
            if !cmd.has_axis() {
                return Err(ValidationError::NoAxis);
            }
            if [cmd.x, cmd.y, cmd.z, cmd.f]
                .into_iter()
                .flatten()
                .any(|v| !v.is_finite())
            {
                return Err(ValidationError::NonFinite);
            }
            if cmd.f.is_some_and(|f| f <= 0.0) {
                return Err(ValidationError::BadFeedRate);
            }
            Ok(())
        }
        CommandKind::FeedSolder => match cmd.s {
            Some(n) if n > MAX_FEED_TENTHS_MM => Err(ValidationError::FeedTooLong(n)),
            Some(n) if n > 0 => Ok(()),
            _ => Err(ValidationError::ZeroFeed),
        },
        kind => Err(ValidationError::NotExecutable(kind)),
    }
}

// ---------------------------------------------------------------------------
// Program cursor
// ---------------------------------------------------------------------------

/// Owns a private copy of a program and walks it line by line.
#[derive(Debug, Clone, Default)]
pub struct ProgramParser {
    buffer: Vec<u8>,
    byte_offset: usize,
    line_number: u32,
    skipped_lines: u32,
}

impl ProgramParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a parser over a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramError> {
        let mut parser = Self::new();
        parser.load_program(bytes)?;
        Ok(parser)
    }

    /// Replace the program with a copy of `bytes` and rewind.
    pub fn load_program(&mut self, bytes: &[u8]) -> Result<(), ProgramError> {
        if bytes.is_empty() {
            return Err(ProgramError::Empty);
        }
        if bytes.len() > MAX_PROGRAM_BYTES {
            return Err(ProgramError::TooLarge {
                len: bytes.len(),
                max: MAX_PROGRAM_BYTES,
            });
        }
        self.buffer.clear();
        self.buffer.extend_from_slice(bytes);
        self.reset();
        Ok(())
    }

    /// Rewind to the first line.
    pub fn reset(&mut self) {
        self.byte_offset = 0;
        self.line_number = 0;
        self.skipped_lines = 0;
    }

    /// Next structurally valid command, or `None` at end of program.
    pub fn next_command(&mut self) -> Option<Command> {
        while self.byte_offset < self.buffer.len() {
            let rest = &self.buffer[self.byte_offset..];
            let (raw, advance) = match rest.iter().position(|&b| b == b'\n') {
                Some(i) => (&rest[..i], i + 1),
                None => (rest, rest.len()),
            };
            self.byte_offset += advance;
            self.line_number += 1;
            let line = self.line_number;

            let parsed = core::str::from_utf8(raw)
                .map_err(|_| ParseError::NotUtf8)
                .and_then(|text| parse_line(text.trim_end_matches('\r')));

            match parsed {
                Ok(None) => {}
                Ok(Some(mut cmd)) => {
                    cmd.line = line;
                    match validate(&cmd) {
                        Ok(()) => return Some(cmd),
                        Err(e) => {
                            if matches!(e, ValidationError::NotExecutable(_)) {
                                warn!("line {}: parser let through {} (skipped)", line, e);
                            } else {
                                warn!("line {}: invalid command: {} (skipped)", line, e);
                            }
                            self.skipped_lines += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!("line {}: {} (skipped)", line, e);
                    self.skipped_lines += 1;
                }
            }
        }
        None
    }

    /// Lines consumed so far.
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Lines rejected by parsing or validation since the last rewind.
    pub fn skipped_lines(&self) -> u32 {
        self.skipped_lines
    }

    pub fn is_finished(&self) -> bool {
        self.byte_offset >= self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
