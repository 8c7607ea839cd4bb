//! Cooperative shutdown coordinator (C1).
//!
//! A single process-wide boolean, `stop requested`, with at-most-once
//! transition from clear to set. Grounded in
//! `examples/original_source/src/kill_throbber/kill_throbber.c`: the
//! original's `sig_atomic_t kill_thread` plus `SIGINT` handler becomes a
//! single `AtomicBool` behind a `OnceLock`, installed once per process.
//! The handler itself does only the atomic store; any printing happens on
//! the worker that observes the transition, not in signal context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crate::ring::CancelToken;

static FLAG: OnceLock<AtomicBool> = OnceLock::new();

fn flag() -> &'static AtomicBool {
    FLAG.get_or_init(|| AtomicBool::new(false))
}

/// Handle onto the process-wide shutdown flag.
///
/// Cheap to construct (it is a reference to a single global atomic); clone
/// freely, pass by value into worker closures.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownFlag;

impl ShutdownFlag {
    /// Returns a handle to the process-wide shutdown flag.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_stop_requested(self) -> bool {
        flag().load(Ordering::Acquire)
    }

    /// Requests shutdown. Idempotent: a second call has no additional
    /// effect.
    pub fn request_stop(self) {
        flag().swap(true, Ordering::Release);
    }

    /// Installs a `Ctrl+C` handler that requests shutdown. Does only the
    /// atomic store in signal context; the worker that observes the
    /// transition (e.g. the heartbeat) is responsible for any printing.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler is already installed for this
    /// process, mirroring `ctrlc::set_handler`'s own contract.
    pub fn install_interrupt_handler(self) -> Result<(), ctrlc::Error> {
        ctrlc::set_handler(move || {
            ShutdownFlag::new().request_stop();
        })
    }
}

impl CancelToken for ShutdownFlag {
    fn is_cancelled(&self) -> bool {
        self.is_stop_requested()
    }
}
