//! Debug assertion macros for ring buffer and stage invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`), zero overhead
//! in release builds.

// =============================================================================
// Bounded count
// =============================================================================

/// Assert that buffered count never exceeds capacity.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// No loss, no duplication
// =============================================================================

/// Assert that total elements read never exceeds total elements written.
macro_rules! debug_assert_no_overread {
    ($read:expr, $written:expr) => {
        debug_assert!(
            $read <= $written,
            "read count {} exceeds written count {}",
            $read,
            $written
        )
    };
}

// =============================================================================
// Active gating
// =============================================================================

/// Assert that `active` is true only while the worker loop is executing.
macro_rules! debug_assert_active_gating {
    ($active:expr, $expected:expr) => {
        debug_assert!(
            $active == $expected,
            "active flag {} does not match expected {}",
            $active,
            $expected
        )
    };
}

// =============================================================================
// Clean join: output buffers ended
// =============================================================================

/// Assert that every ring buffer a stage owns is ended once its worker has
/// joined.
macro_rules! debug_assert_output_ended_on_join {
    ($owns_output:expr, $alive:expr) => {
        debug_assert!(
            !$owns_output || !$alive,
            "stage joined but still owns a live output ring buffer"
        )
    };
}

// =============================================================================
// Monotone counter
// =============================================================================

/// Assert that `total_elements_processed` never decreases.
macro_rules! debug_assert_monotonic_counter {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "total_elements_processed decreased from {} to {}",
            $old,
            $new
        )
    };
}

pub(crate) use debug_assert_active_gating;
pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_monotonic_counter;
pub(crate) use debug_assert_no_overread;
pub(crate) use debug_assert_output_ended_on_join;
