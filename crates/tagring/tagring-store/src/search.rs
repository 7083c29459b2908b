//! Binary search over the retained records by arrival time.
//!
//! Both searches return logical indices in `[oldest, count]`. Arrival times
//! are non-decreasing in logical order, which is what the producer guarantees
//! by pushing in time order.

use crate::buffer::TagBuffer;
use crate::ring::oldest_index;
use tagring_events::TimeTag;

impl<T: TimeTag> TagBuffer<T> {
    /// Smallest logical index whose arrival time is `>= key`.
    ///
    /// Returns `count` when every retained record is older than `key`, and
    /// `0` for an empty buffer.
    pub fn lower_bound(&self, key: u64) -> u64 {
        self.lower_bound_in(key, self.count())
    }

    /// [`lower_bound`](Self::lower_bound) over the records retained at an
    /// earlier `count`. The result is at most `count`.
    pub fn lower_bound_in(&self, key: u64, count: u64) -> u64 {
        self.partition_point(count, |arrival| arrival < key)
    }

    /// Smallest logical index whose arrival time is `> key`.
    pub fn upper_bound(&self, key: u64) -> u64 {
        self.partition_point(self.count(), |arrival| arrival <= key)
    }

    fn partition_point(&self, count: u64, before: impl Fn(u64) -> bool) -> u64 {
        let capacity = self.capacity();
        let mut lo = oldest_index(count, capacity);
        let mut hi = count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if before(self.arrival_time_at(mid % capacity)) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}
