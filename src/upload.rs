//! Program upload buffer.
//!
//! The upload path (web handler, serial console) writes a program here
//! while the control loop keeps running.  The lock is held only for the
//! copy in and the copy out; the parser always works on its own copy.

use std::sync::Mutex;

use log::{info, warn};

use crate::error::ProgramError;
use crate::gcode::parser::MAX_PROGRAM_BYTES;

#[derive(Default)]
pub struct ProgramUpload {
    buffer: Mutex<Vec<u8>>,
}

impl ProgramUpload {
    pub const fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Replace the stored program.
    pub fn store(&self, bytes: &[u8]) -> Result<(), ProgramError> {
        if bytes.is_empty() {
            return Err(ProgramError::Empty);
        }
        if bytes.len() > MAX_PROGRAM_BYTES {
            warn!(
                "Upload: {} bytes rejected (max {})",
                bytes.len(),
                MAX_PROGRAM_BYTES
            );
            return Err(ProgramError::TooLarge {
                len: bytes.len(),
                max: MAX_PROGRAM_BYTES,
            });
        }
        let mut buffer = self.lock();
        buffer.clear();
        buffer.extend_from_slice(bytes);
        info!("Upload: stored {} byte program", bytes.len());
        Ok(())
    }

    /// Copy of the stored program.
    pub fn snapshot(&self) -> Result<Vec<u8>, ProgramError> {
        let buffer = self.lock();
        if buffer.is_empty() {
            return Err(ProgramError::Empty);
        }
        Ok(buffer.clone())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panic while holding the lock leaves plain bytes behind, which
    /// are still usable.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
