//! Index arithmetic for a ring of arbitrary capacity.
//!
//! Logical indices count records ever written and never wrap. A logical
//! range `[start, stop)` that fits in the ring maps onto at most two
//! contiguous physical spans:
//!
//! ```text
//! capacity = 8, start = 6, stop = 11
//!
//! physical  0   1   2   3   4   5   6   7
//!         ┌───┬───┬───┬───┬───┬───┬───┬───┐
//!         │ 8 │ 9 │10 │   │   │   │ 6 │ 7 │   (logical index in each slot)
//!         └───┴───┴───┴───┴───┴───┴───┴───┘
//!           └─ upper ──┘              └lower┘
//! ```

use crate::error::{Result, StoreError};
use std::iter::FusedIterator;
use std::ops::Range;

/// Walks the physical slots of a logical range in logical order.
///
/// `next` returns the slot the cursor points at and then advances, so the
/// first call yields `start % capacity`. Exhaustion is `None`; slot 0 is an
/// ordinary index. Stepping costs no division.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularIterator {
    lower: Range<u64>,
    upper: Range<u64>,
}

impl CircularIterator {
    /// Fails with `InvalidRange` when the range is empty, reversed, or longer
    /// than the ring.
    pub fn new(capacity: u64, start: u64, stop: u64) -> Result<Self> {
        if capacity == 0 || start >= stop || stop - start > capacity {
            return Err(StoreError::InvalidRange { start, stop });
        }
        let first = start % capacity;
        let len = stop - start;
        let n_lower = len.min(capacity - first);
        Ok(Self {
            lower: first..first + n_lower,
            upper: 0..len - n_lower,
        })
    }

    /// Remaining slots before the wrap point.
    pub fn lower_span(&self) -> Range<u64> {
        self.lower.clone()
    }

    /// Remaining slots after the wrap point. Empty when the range never wraps.
    pub fn upper_span(&self) -> Range<u64> {
        self.upper.clone()
    }

    pub fn remaining(&self) -> u64 {
        (self.lower.end - self.lower.start) + (self.upper.end - self.upper.start)
    }
}

impl Iterator for CircularIterator {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        self.lower.next().or_else(|| self.upper.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for CircularIterator {}

impl FusedIterator for CircularIterator {}

/// Logical index of the oldest record still held by the ring.
#[inline]
pub fn oldest_index(count: u64, capacity: u64) -> u64 {
    count.saturating_sub(capacity)
}

/// Checks that logical index `start` has not been overwritten.
///
/// `head` is the writer's claimed end: once a push toward `head` has begun,
/// every slot older than `head - capacity` may hold newer data.
///
/// ```text
/// capacity = 8, head = 20
/// oldest = 20 - 8 = 12
/// start = 12 -> Ok
/// start = 11 -> Overrun { start: 11, oldest: 12 }
/// ```
#[inline]
pub fn check_retained(start: u64, head: u64, capacity: u64) -> Result<()> {
    let oldest = oldest_index(head, capacity);
    if start < oldest {
        return Err(StoreError::Overrun { start, oldest });
    }
    Ok(())
}
