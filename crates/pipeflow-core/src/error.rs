//! Error types for ring buffer, stage, and logger operations.

use thiserror::Error;

/// Errors from `Ring::create`. No other ring operation fails at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The requested capacity/element-size combination could not be
    /// allocated.
    #[error("ring buffer allocation failed (capacity {capacity_elements} x {element_size} bytes)")]
    AllocationFailed {
        /// Requested capacity in elements.
        capacity_elements: usize,
        /// Requested element size in bytes.
        element_size: usize,
    },
}

/// Errors from stage setup and lifecycle operations.
///
/// A type mismatch on `bind_input` is deliberately **not** a variant here:
/// per the binding policy, mismatched tags are a warning emitted to the
/// logger, not a fatal error. Making this fallible would contradict the
/// "warn, do not fail" contract.
#[derive(Debug, Error)]
pub enum StageError {
    /// The payload's `init` callback returned an error. The stage is safe
    /// to clean up but must not be started.
    #[error("stage init refused: {0}")]
    InitRefused(String),

    /// Allocating the stage's output ring buffer failed.
    #[error("stage output ring buffer allocation failed: {0}")]
    OutputRing(#[from] RingError),

    /// Spawning the stage's worker thread failed.
    #[error("failed to spawn stage worker: {0}")]
    SpawnFailed(String),

    /// The payload reported an unrecoverable runtime error while running.
    /// Not fatal to the process: the stage shell logs it, requests
    /// shutdown, and ends its output buffers.
    #[error("stage runtime error: {0}")]
    Runtime(String),
}

/// Errors from `Logger` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoggerError {
    /// The formatted message exceeded the maximum record length and was
    /// dropped.
    #[error("log message exceeds maximum length of {max} bytes")]
    MessageTooLong {
        /// The configured maximum message length.
        max: usize,
    },

    /// Opening the destination log file failed.
    #[error("failed to open log file")]
    OpenFailed,
}
