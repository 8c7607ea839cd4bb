//! Bounded, blocking, byte-addressable ring buffer (C2).
//!
//! # Synchronization strategy
//!
//! Exactly one producer and one consumer operate on a `Ring` concurrently.
//! A single `Mutex<State>` guards `head`, `tail`, `count`, and `alive`; two
//! `Condvar`s signal the empty→non-empty and full→non-full transitions. A
//! worker never holds two rings' mutexes at once: it reads from its input
//! ring (mutex released before returning), then writes to its output ring.
//!
//! This buffer stores raw bytes rather than `T`, because the element
//! format is a runtime tag (`ElementTag`), not a Rust type parameter. The
//! stage payload on either end interprets the bytes according to the tag
//! it declared during `init`.
//!
//! Reads and writes never copy across the buffer's wrap boundary in one
//! pass: each call copies at most the immediately contiguous free or used
//! region, so a caller that wants to move `n` elements across a wrap point
//! sees this as two short calls rather than one call doing an internal
//! second copy. Callers already loop on short reads/writes, so this keeps
//! the implementation simple without changing observed semantics.

use std::sync::{Condvar, Mutex};

use crate::error::RingError;
use crate::invariants::{debug_assert_bounded_count, debug_assert_no_overread};

/// A caller-supplied predicate checked under the ring's lock while a
/// blocking call is parked. When it returns `true`, the call returns its
/// current short count instead of continuing to block.
pub trait CancelToken {
    /// Returns `true` if the blocking call should return immediately.
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels, for callers that don't need cooperative
/// cancellation (e.g. unit tests exercising the ring in isolation).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCancel;

impl CancelToken for NoCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<F: Fn() -> bool> CancelToken for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

struct State {
    buffer: Box<[u8]>,
    /// Index (in elements) of the next element to read.
    head: usize,
    /// Index (in elements) of the next free slot to write.
    tail: usize,
    /// Number of buffered elements.
    count: usize,
    /// Total elements ever written (for the no-loss/no-duplication property).
    total_written: u64,
    /// Total elements ever read.
    total_read: u64,
    /// Monotone liveness flag. Once cleared, stays cleared.
    alive: bool,
}

/// Bounded single-producer/single-consumer byte-addressable queue with
/// blocking read, blocking write, and a sticky end-of-stream state.
pub struct Ring {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity_elements: usize,
    element_size: usize,
}

impl Ring {
    /// Creates a new, empty, alive ring buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::AllocationFailed`] only if the backing storage
    /// cannot be allocated.
    pub fn create(capacity_elements: usize, element_size_bytes: usize) -> Result<Self, RingError> {
        let total_bytes = capacity_elements
            .checked_mul(element_size_bytes)
            .ok_or(RingError::AllocationFailed {
                capacity_elements,
                element_size: element_size_bytes,
            })?;

        let buffer = vec![0u8; total_bytes].into_boxed_slice();

        Ok(Self {
            state: Mutex::new(State {
                buffer,
                head: 0,
                tail: 0,
                count: 0,
                total_written: 0,
                total_read: 0,
                alive: true,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity_elements,
            element_size: element_size_bytes,
        })
    }

    /// Capacity in elements.
    #[must_use]
    pub fn capacity_elements(&self) -> usize {
        self.capacity_elements
    }

    /// Element size in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Returns `true` if the ring is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).alive
    }

    /// Ends the ring: clears `alive` and wakes every blocked reader and
    /// writer. Idempotent.
    pub fn end(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.alive = false;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Copies up to `n_elements` from `src` into the ring, blocking while
    /// full and alive. Returns the number of elements actually written
    /// (0 <= k <= n_elements); a short count means the ring became not
    /// alive, a cancellation fired, or only a partial contiguous region
    /// was available this call.
    ///
    /// `src` must contain at least `n_elements * element_size()` bytes.
    pub fn blocking_write<C: CancelToken>(&self, src: &[u8], n_elements: usize, cancel: &C) -> usize {
        if n_elements == 0 {
            return 0;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            if !state.alive {
                return 0;
            }

            let free = self.capacity_elements - state.count;
            if free > 0 {
                break;
            }

            if cancel.is_cancelled() {
                return 0;
            }

            let (guard, timeout) = self
                .not_full
                .wait_timeout(state, std::time::Duration::from_millis(50))
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
            let _ = timeout;
        }

        let free = self.capacity_elements - state.count;
        let contiguous_to_end = self.capacity_elements - (state.tail % self.capacity_elements);
        let take = n_elements.min(free).min(contiguous_to_end);

        let tail_idx = state.tail % self.capacity_elements;
        let byte_off = tail_idx * self.element_size;
        let byte_len = take * self.element_size;
        state.buffer[byte_off..byte_off + byte_len].copy_from_slice(&src[..byte_len]);

        state.tail += take;
        state.count += take;
        state.total_written += take as u64;

        debug_assert_bounded_count!(state.count, self.capacity_elements);

        drop(state);
        self.not_empty.notify_all();

        take
    }

    /// Copies up to `n_elements` available elements into `dst`, blocking
    /// while empty and alive. Returns the number of elements actually read
    /// (0 <= k <= n_elements); when the ring becomes not alive mid-wait the
    /// remaining buffered elements are drained first, then a zero-length
    /// read signals end-of-stream.
    ///
    /// `dst` must have room for at least `n_elements * element_size()` bytes.
    pub fn blocking_read<C: CancelToken>(&self, dst: &mut [u8], n_elements: usize, cancel: &C) -> usize {
        if n_elements == 0 {
            return 0;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            if state.count > 0 {
                break;
            }
            if !state.alive {
                return 0;
            }
            if cancel.is_cancelled() {
                return 0;
            }

            let (guard, timeout) = self
                .not_empty
                .wait_timeout(state, std::time::Duration::from_millis(50))
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
            let _ = timeout;
        }

        let contiguous_to_end = self.capacity_elements - (state.head % self.capacity_elements);
        let take = n_elements.min(state.count).min(contiguous_to_end);

        let head_idx = state.head % self.capacity_elements;
        let byte_off = head_idx * self.element_size;
        let byte_len = take * self.element_size;
        dst[..byte_len].copy_from_slice(&state.buffer[byte_off..byte_off + byte_len]);

        state.head += take;
        state.count -= take;
        state.total_read += take as u64;

        debug_assert_no_overread!(state.total_read, state.total_written);

        drop(state);
        self.not_full.notify_all();

        take
    }

    /// Number of elements currently buffered. Racy by nature (a concurrent
    /// producer/consumer may change it immediately after the call); useful
    /// for diagnostics and tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).count
    }

    /// Returns `true` if no elements are currently buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
