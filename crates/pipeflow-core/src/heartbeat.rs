//! Cosmetic terminal heartbeat.
//!
//! Grounded in `throbber()` in
//! `examples/original_source/src/kill_throbber/kill_throbber.c`: a spinning
//! character printed to stdout at ~10 Hz, with the terminal cursor hidden
//! for the duration. Purely cosmetic; shutdown correctness never depends
//! on it.
//!
//! Per the open question in `spec.md` section 9 about inconsistent
//! start/end/kill/wait orderings across the original's binaries, this is
//! normalized to a single pair of operations: `spawn` starts exactly one
//! heartbeat, `stop_and_join` signals it to stop exactly once and joins it.

use std::thread::JoinHandle;
use std::time::Duration;

use crate::shutdown::ShutdownFlag;

const FRAMES: [char; 4] = ['\\', '|', '/', '-'];
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// A running heartbeat worker.
pub struct Heartbeat {
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Starts the heartbeat on a dedicated worker. It prints one spinning
    /// character per frame interval until `shutdown` reports a stop
    /// request, then restores the terminal cursor.
    #[must_use]
    pub fn spawn(shutdown: ShutdownFlag) -> Self {
        let handle = std::thread::spawn(move || {
            print!("\x1b[?25l");
            let mut index = 0usize;
            while !shutdown.is_stop_requested() {
                print!("\r{}", FRAMES[index % FRAMES.len()]);
                let _ = std::io::Write::flush(&mut std::io::stdout());
                index += 1;
                std::thread::sleep(FRAME_INTERVAL);
            }
            print!("\x1b[?25h");
            println!("\nINFO: application shutting down.");
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Joins the heartbeat worker. The caller is expected to have already
    /// requested shutdown (directly or via the interrupt handler); this
    /// method only waits, it does not itself set the flag.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
