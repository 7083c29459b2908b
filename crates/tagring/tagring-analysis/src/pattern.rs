//! Per-channel cursors and the sliding k-way merge behind every coincidence
//! measurement.
//!
//! Each configured channel gets a cursor that visits only that channel's
//! records, in arrival order. Channel delays are folded into an adjusted
//! arrival time `arrival + delay_bins`, so aligning channels is a plain
//! comparison:
//!
//! ```text
//! delays (bins)   ch0: 0   ch1: 30          normalized: ch0: +30  ch1: +0
//!
//! raw        ch0 ──●────────────●──────     ch1 ─────────●──────────●──
//!                  100          400                      130        430
//! adjusted   ch0 ──●────────────●──────     ch1 ─────────●──────────●──
//!                  130          430                      130        430
//! ```
//!
//! The merge repeatedly looks at the cursor with the oldest adjusted time,
//! reports a coincidence when every other cursor sits less than one window
//! diameter after it, then advances that oldest cursor.

use crate::measurement::Measurement;
use tagring_events::{TimeTag, bins_from_time_signed};
use tagring_store::{CircularIterator, Result, TagBuffer};

/// Shifts delays so the largest maps to zero and the others are positive.
///
/// `offset = max_j round(d_j / res)`, `bins_i = offset - round(d_i / res)`.
pub(crate) fn normalize_delays(resolution: f64, delays: &[f64]) -> Vec<u64> {
    let bins: Vec<i64> = delays
        .iter()
        .map(|&d| bins_from_time_signed(resolution, d))
        .collect();
    let offset = bins.iter().copied().max().unwrap_or(0);
    bins.iter()
        .map(|&b| (i128::from(offset) - i128::from(b)) as u64)
        .collect()
}

#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    pub channel: u8,
    /// Physical slot of the record the cursor points at.
    pub slot: u64,
    pub arrival: u64,
    pub delay_bins: u64,
    slots: CircularIterator,
}

impl Cursor {
    #[inline]
    pub fn adjusted(&self) -> u64 {
        self.arrival.saturating_add(self.delay_bins)
    }

    /// Moves to the next record of this channel. `false` once none is left.
    #[inline]
    fn advance<T: TimeTag>(&mut self, buffer: &TagBuffer<T>) -> bool {
        for slot in self.slots.by_ref() {
            if buffer.channel_at(slot) == self.channel {
                self.slot = slot;
                self.arrival = buffer.arrival_time_at(slot);
                return true;
            }
        }
        false
    }
}

#[derive(Debug)]
pub(crate) struct PatternCursors {
    cursors: Vec<Cursor>,
    diameter: u64,
    /// Oldest logical index any cursor was seeded at.
    start: u64,
}

/// Width of the coincidence window in arrival units of `buffer`.
pub(crate) fn diameter_bins<T: TimeTag>(buffer: &TagBuffer<T>, measurement: &Measurement) -> u64 {
    buffer
        .bins_from_time(measurement.radius())
        .saturating_mul(2)
}

impl PatternCursors {
    /// Seeds one cursor per channel inside the read window.
    ///
    /// Channel `i` may see records up to `newest - delay_bins[i]`, so its
    /// window is `[newest - delay_bins[i] - read_bins, count)` for one
    /// snapshot of `count`. Returns `Ok(None)` when the buffer is empty or
    /// some channel has no record in its window, in which case no
    /// coincidence is possible, and `Overrun` when the seeding read slots the
    /// writer replaced.
    pub fn new<T: TimeTag>(
        buffer: &TagBuffer<T>,
        measurement: &Measurement,
    ) -> Result<Option<Self>> {
        let Some((count, newest)) = buffer.newest_snapshot() else {
            return Ok(None);
        };
        let read_bins = buffer.bins_from_time(measurement.read_time());
        let delay_bins = normalize_delays(buffer.resolution(), measurement.delays());

        let mut cursors = Vec::with_capacity(measurement.channels().len());
        let mut start = count;
        for (&channel, &delay) in measurement.channels().iter().zip(&delay_bins) {
            let limit = newest.saturating_sub(delay);
            let seed = buffer.lower_bound_in(limit.saturating_sub(read_bins), count);
            start = start.min(seed);
            let Ok(slots) = CircularIterator::new(buffer.capacity(), seed, count) else {
                buffer.ensure_retained(start)?;
                return Ok(None);
            };
            let mut cursor = Cursor {
                channel,
                slot: 0,
                arrival: 0,
                delay_bins: delay,
                slots,
            };
            if !cursor.advance(buffer) {
                buffer.ensure_retained(start)?;
                return Ok(None);
            }
            cursors.push(cursor);
        }

        Ok(Some(Self {
            cursors,
            diameter: diameter_bins(buffer, measurement),
            start,
        }))
    }

    pub fn diameter(&self) -> u64 {
        self.diameter
    }

    /// Index of the cursor with the oldest adjusted arrival. Ties go to the
    /// lowest index.
    #[inline]
    fn oldest(&self) -> usize {
        let mut oldest = 0;
        for (i, cursor) in self.cursors.iter().enumerate().skip(1) {
            if cursor.adjusted() < self.cursors[oldest].adjusted() {
                oldest = i;
            }
        }
        oldest
    }

    #[inline]
    fn is_coincidence(&self, oldest: usize) -> bool {
        let base = self.cursors[oldest].adjusted();
        self.cursors
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != oldest)
            .all(|(_, c)| c.adjusted() - base < self.diameter)
    }

    /// Runs the merge to completion, calling `on_match` with the cursors of
    /// every coincidence. Returns the number of coincidences, or `Overrun`
    /// if the writer replaced any walked slot meanwhile; matches reported
    /// before such an error are not trustworthy.
    pub fn walk<T: TimeTag>(
        &mut self,
        buffer: &TagBuffer<T>,
        mut on_match: impl FnMut(&[Cursor]),
    ) -> Result<u64> {
        let mut found = 0;
        loop {
            let oldest = self.oldest();
            if self.is_coincidence(oldest) {
                found += 1;
                on_match(&self.cursors);
            }
            if !self.cursors[oldest].advance(buffer) {
                break;
            }
        }
        buffer.ensure_retained(self.start)?;
        Ok(found)
    }
}
