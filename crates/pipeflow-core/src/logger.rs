//! Ordered, non-blocking diagnostic logger (C5).
//!
//! Grounded in `examples/original_source/src/logger/logger.c`: a single
//! writer thread drains an internal byte ring buffer to a `{prefix}.log`
//! file, flushing after each batch. Producers enqueue formatted records
//! and never block on file I/O; they only block briefly if the internal
//! ring is momentarily full, which the original accepts ("logger producers
//! are already tolerant of brief delays").

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::LoggerError;
use crate::ring::{NoCancel, Ring};

/// Maximum formatted message length in bytes, matching the original's
/// `strlen(p_message) > 240` guard.
pub const MAX_MESSAGE_LEN: usize = 240;

/// Internal ring buffer capacity in bytes, matching the original's
/// `BUF_SIZE = 1 << 10`.
const RING_CAPACITY_BYTES: usize = 1 << 10;

/// Writer read chunk size in bytes, matching the original's `RD_SIZE = 1 << 8`.
const READ_CHUNK_BYTES: usize = 1 << 8;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational record.
    Info,
    /// Warning record (non-fatal).
    Warning,
    /// Error record (runtime failure, fatal to the pipeline but not the
    /// process).
    Error,
}

impl Severity {
    /// Fixed-width tag matching the original's 7-character padding
    /// (`"ERROR  "`, `"WARNING"`, `"INFO   "`).
    const fn tag(self) -> &'static str {
        match self {
            Self::Info => "INFO   ",
            Self::Warning => "WARNING",
            Self::Error => "ERROR  ",
        }
    }
}

/// Single process-wide ordered append log.
pub struct Logger {
    ring: Arc<Ring>,
    writer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    /// Held for the duration of one `write_record` call so concurrent
    /// producers enqueue whole records, never interleaved chunks. `Ring`
    /// itself is single-producer; this is what makes many stages sharing
    /// one `Logger` safe.
    write_lock: Mutex<()>,
}

impl Logger {
    /// Creates a logger writing to `{path}.log` and starts its writer
    /// worker.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::OpenFailed`] if the destination file cannot
    /// be opened for writing.
    pub fn create(path: &str) -> Result<Self, LoggerError> {
        let file_path = format!("{path}.log");
        let file = File::create(&file_path).map_err(|_| LoggerError::OpenFailed)?;

        let ring = Arc::new(Ring::create(RING_CAPACITY_BYTES, 1).map_err(|_| LoggerError::OpenFailed)?);

        let logger = Self {
            ring,
            writer: Mutex::new(None),
            closed: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        };

        logger.spawn_writer(file);

        Ok(logger)
    }

    fn spawn_writer(&self, mut file: File) {
        let ring = Arc::clone(&self.ring);
        let handle = std::thread::spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];

            loop {
                let n = ring.blocking_read(&mut buf, READ_CHUNK_BYTES, &NoCancel);
                if n > 0 {
                    let _ = file.write_all(&buf[..n]);
                    let _ = file.flush();
                }
                if !ring.is_alive() && n == 0 {
                    break;
                }
            }
        });

        *self.writer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    fn write_record(&self, severity: Severity, message: &str) -> Result<(), LoggerError> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(LoggerError::MessageTooLong {
                max: MAX_MESSAGE_LEN,
            });
        }

        let record = format!("{} :: {}\n", severity.tag(), message);
        let bytes = record.as_bytes();

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut written = 0;
        while written < bytes.len() {
            let n = self.ring.blocking_write(&bytes[written..], bytes.len() - written, &NoCancel);
            if n == 0 {
                break;
            }
            written += n;
        }

        Ok(())
    }

    /// Appends an informational record.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::MessageTooLong`] if `message` exceeds
    /// [`MAX_MESSAGE_LEN`] bytes; the record is dropped rather than
    /// truncated.
    pub fn info(&self, message: &str) -> Result<(), LoggerError> {
        self.write_record(Severity::Info, message)
    }

    /// Appends a warning record. See [`Logger::info`] for the length
    /// contract.
    pub fn warn(&self, message: &str) -> Result<(), LoggerError> {
        self.write_record(Severity::Warning, message)
    }

    /// Appends an error record. See [`Logger::info`] for the length
    /// contract.
    pub fn error(&self, message: &str) -> Result<(), LoggerError> {
        self.write_record(Severity::Error, message)
    }

    /// Ends the internal buffer, joins the writer thread, and closes the
    /// file. Safe to call from any thread, exactly once; subsequent calls
    /// are no-ops.
    pub fn cleanup(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.ring.end();

        if let Some(handle) = self.writer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.cleanup();
    }
}
