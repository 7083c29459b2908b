use tagring_events::TimeTag;
use tagring_store::{CircularIterator, Result, StoreError, TagBuffer};

/// Per-channel event counts over a range of records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Singles {
    pub total: u64,
    /// Indexed by channel. At least `channel_count` long, longer if a record
    /// carries a higher channel number.
    pub counts: Vec<u64>,
}

impl Singles {
    fn from_histogram(histogram: &[u64; 256], channel_count: u8) -> Self {
        let highest_seen = histogram.iter().rposition(|&n| n > 0).map_or(0, |c| c + 1);
        let len = highest_seen.max(usize::from(channel_count));
        Self {
            total: histogram.iter().sum(),
            counts: histogram[..len].to_vec(),
        }
    }

    pub fn get(&self, channel: u8) -> u64 {
        self.counts.get(usize::from(channel)).copied().unwrap_or(0)
    }
}

/// Counts records per channel over the logical range `[start, stop)`.
///
/// Fails with `InvalidRange` for an empty range or one past the count, and
/// `Overrun` when `start` is no longer retained or was overwritten while
/// counting.
pub fn singles<T: TimeTag>(buffer: &TagBuffer<T>, start: u64, stop: u64) -> Result<Singles> {
    let count = buffer.count();
    if stop > count {
        return Err(StoreError::InvalidRange { start, stop });
    }
    buffer.ensure_retained(start)?;

    let mut histogram = [0u64; 256];
    for slot in CircularIterator::new(buffer.capacity(), start, stop)? {
        histogram[usize::from(buffer.channel_at(slot))] += 1;
    }
    buffer.ensure_retained(start)?;
    Ok(Singles::from_histogram(&histogram, buffer.channel_count()))
}

/// Counts records per channel over the last `read_time` seconds.
pub fn singles_over<T: TimeTag>(buffer: &TagBuffer<T>, read_time: f64) -> Result<Singles> {
    let Some((count, newest)) = buffer.newest_snapshot() else {
        return Ok(Singles::from_histogram(&[0; 256], buffer.channel_count()));
    };
    let key = newest.saturating_sub(buffer.bins_from_time(read_time));
    singles(buffer, buffer.lower_bound_in(key, count), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagring_store::{BufferSpec, StandardBuffer, StandardTag};

    fn buffer(dir: &tempfile::TempDir, capacity: u64) -> StandardBuffer {
        StandardBuffer::create_in(dir.path(), "singles", BufferSpec::standard(capacity, 1.0, 2))
            .unwrap()
    }

    #[test]
    fn range_split_at_wrap_counts_both_halves() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = buffer(&dir, 8);
        let channels = [0, 0, 0, 0, 0, 0, 0, 1, 1, 1];
        let stamps: Vec<_> = (0..10).map(StandardTag).collect();
        buf.push(&channels[..8], &stamps[..8]).unwrap();
        buf.push(&channels[8..], &stamps[8..]).unwrap();

        // logical 6,7 sit in slots 6,7 and logical 8,9 in slots 0,1
        let s = singles(&buf, 6, 10).unwrap();
        assert_eq!(s.total, 4);
        assert_eq!(s.counts, vec![1, 3]);
    }

    #[test]
    fn counts_grow_past_channel_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = buffer(&dir, 8);
        buf.push(&[0, 5, 5], &[StandardTag(1), StandardTag(2), StandardTag(3)])
            .unwrap();
        let s = singles(&buf, 0, 3).unwrap();
        assert_eq!(s.counts, vec![1, 0, 0, 0, 0, 2]);
        assert_eq!(s.get(5), 2);
        assert_eq!(s.get(200), 0);
    }

    #[test]
    fn rejects_stale_and_future_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = buffer(&dir, 4);
        let stamps: Vec<_> = (0..6).map(StandardTag).collect();
        buf.push(&[0; 4], &stamps[..4]).unwrap();
        buf.push(&[0; 2], &stamps[4..]).unwrap();
        assert!(matches!(
            singles(&buf, 1, 4),
            Err(StoreError::Overrun { start: 1, oldest: 2 })
        ));
        assert!(matches!(
            singles(&buf, 3, 7),
            Err(StoreError::InvalidRange { .. })
        ));
    }

    #[test]
    fn read_time_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = buffer(&dir, 16);
        assert_eq!(singles_over(&buf, 10.0).unwrap().counts, vec![0, 0]);

        buf.push(
            &[0, 1, 0, 1],
            &[StandardTag(0), StandardTag(40), StandardTag(80), StandardTag(100)],
        )
        .unwrap();
        let recent = singles_over(&buf, 30.0).unwrap();
        assert_eq!(recent.total, 2);
        assert_eq!(recent.counts, vec![1, 1]);
        assert_eq!(singles_over(&buf, 1e9).unwrap().total, 4);
    }
}
