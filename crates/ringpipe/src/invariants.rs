//! Debug assertion macros for ring store invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`), so release builds
//! pay nothing for them.
//!
//! Used by `RingStore` after every cursor update and by the channel when a
//! handle is released.

// =============================================================================
// INV-RING-01: Cursors In Bounds
// =============================================================================

/// Assert that a cursor lies inside the buffer.
///
/// **Invariant**: `0 ≤ pos < capacity`
///
/// Used in: `RingStore::advance_read()`, `RingStore::advance_write()`
macro_rules! debug_assert_cursor_in_bounds {
    ($name:literal, $pos:expr, $capacity:expr) => {
        debug_assert!(
            $pos < $capacity,
            "INV-RING-01 violated: {} cursor {} outside buffer of {} bytes",
            $name,
            $pos,
            $capacity
        )
    };
}

// =============================================================================
// INV-RING-02: Sentinel Slot
// =============================================================================

/// Assert that resident bytes never reach the sentinel slot.
///
/// **Invariant**: `len ≤ capacity - 1`
///
/// Used in: `RingStore::advance_write()` after moving `write_pos`
macro_rules! debug_assert_sentinel_kept {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len < $capacity,
            "INV-RING-02 violated: {} resident bytes leave no sentinel in {} byte buffer",
            $len,
            $capacity
        )
    };
}

// =============================================================================
// INV-RING-03: Single Segment
// =============================================================================

/// Assert that a copy stays within one contiguous run.
///
/// **Invariant**: `pos + n ≤ capacity` (a single call never crosses the wrap)
///
/// Used in: `RingStore::read_into()`, `RingStore::write_from()`
macro_rules! debug_assert_single_segment {
    ($pos:expr, $n:expr, $capacity:expr) => {
        debug_assert!(
            $pos + $n <= $capacity,
            "INV-RING-03 violated: copy of {} bytes at {} crosses end of {} byte buffer",
            $n,
            $pos,
            $capacity
        )
    };
}

// =============================================================================
// INV-CH-01: Open Counts
// =============================================================================

/// Assert that a close has a matching open to release.
///
/// **Invariant**: `open_reader_count ≥ 0 ∧ open_writer_count ≥ 0`
///
/// Used in: `Shared::release()` before decrementing
macro_rules! debug_assert_open_count {
    ($name:literal, $count:expr) => {
        debug_assert!(
            $count > 0,
            "INV-CH-01 violated: closing a {} with open count {}",
            $name,
            $count
        )
    };
}

pub(crate) use debug_assert_cursor_in_bounds;
pub(crate) use debug_assert_open_count;
pub(crate) use debug_assert_sentinel_kept;
pub(crate) use debug_assert_single_segment;
