use tagring_events::TimeTag;
use tagring_store::{CircularIterator, Result, TagBuffer};
use tracing::debug;

/// Event counts of `channels` in consecutive bins of `bin_width` arrival
/// units, over the last `read_time` seconds.
///
/// The first bin starts at the first record in the window. Only completed
/// bins are reported: a bin is emitted once a record at or past its end is
/// seen, so gaps produce zero bins and the trailing partial bin is dropped.
/// An empty buffer or a `bin_width` of 0 gives an empty trace.
///
/// The walk stays below the count loaded at the start and stops at any
/// arrival later than the newest record of that snapshot, so the trace
/// never spans more than the window. Fails with `Overrun` when the writer
/// replaced part of the window meanwhile.
pub fn timetrace<T: TimeTag>(
    buffer: &TagBuffer<T>,
    channels: &[u8],
    read_time: f64,
    bin_width: u64,
) -> Result<Vec<u64>> {
    let mut trace = Vec::new();
    let Some((count, newest)) = buffer.newest_snapshot() else {
        return Ok(trace);
    };
    if bin_width == 0 {
        return Ok(trace);
    }

    let key = newest.saturating_sub(buffer.bins_from_time(read_time));
    let start = buffer.lower_bound_in(key, count);
    let Ok(slots) = CircularIterator::new(buffer.capacity(), start, count) else {
        buffer.ensure_retained(start)?;
        return Ok(trace);
    };

    let mut wanted = [false; 256];
    for &channel in channels {
        wanted[usize::from(channel)] = true;
    }

    let mut end_of_bin: Option<u64> = None;
    let mut intensity = 0;
    for slot in slots {
        let arrival = buffer.arrival_time_at(slot);
        if arrival > newest {
            // only a slot the writer already replaced can be this new
            break;
        }
        let end = end_of_bin.get_or_insert(arrival.saturating_add(bin_width));
        while arrival >= *end {
            trace.push(intensity);
            intensity = 0;
            *end = end.saturating_add(bin_width);
        }
        if wanted[usize::from(buffer.channel_at(slot))] {
            intensity += 1;
        }
    }
    buffer.ensure_retained(start)?;

    debug!(
        target: "tagring::analysis",
        channels = ?channels,
        bin_width,
        bins = trace.len(),
        "timetrace"
    );
    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagring_store::{BufferSpec, StandardBuffer, StandardTag};

    fn buffer(dir: &tempfile::TempDir, events: &[(u8, u64)]) -> StandardBuffer {
        let mut buf =
            StandardBuffer::create_in(dir.path(), "trace", BufferSpec::standard(64, 1.0, 2))
                .unwrap();
        if !events.is_empty() {
            let channels: Vec<u8> = events.iter().map(|e| e.0).collect();
            let stamps: Vec<_> = events.iter().map(|e| StandardTag(e.1)).collect();
            buf.push(&channels, &stamps).unwrap();
        }
        buf
    }

    #[test]
    fn counts_completed_bins_only() {
        let dir = tempfile::tempdir().unwrap();
        let buf = buffer(
            &dir,
            &[(0, 0), (1, 3), (0, 9), (0, 10), (1, 12), (0, 35), (0, 36)],
        );
        // bins [0,10) [10,20) [20,30) then [30,40) still open
        assert_eq!(timetrace(&buf, &[0, 1], 1e6, 10).unwrap(), vec![3, 2, 0]);
        assert_eq!(timetrace(&buf, &[1], 1e6, 10).unwrap(), vec![1, 1, 0]);
    }

    #[test]
    fn window_starts_at_read_time() {
        let dir = tempfile::tempdir().unwrap();
        let buf = buffer(&dir, &[(0, 0), (0, 50), (0, 55), (0, 61), (0, 70)]);
        // window from 70 - 20 = 50
        assert_eq!(timetrace(&buf, &[0], 20.0, 10).unwrap(), vec![2, 1]);
    }

    #[test]
    fn degenerate_inputs_give_empty_trace() {
        let dir = tempfile::tempdir().unwrap();
        let empty = buffer(&dir, &[]);
        assert!(timetrace(&empty, &[0], 1.0, 10).unwrap().is_empty());
        drop(empty);

        let buf = buffer(&dir, &[(0, 1), (0, 2)]);
        assert!(timetrace(&buf, &[0], 1e6, 0).unwrap().is_empty());
    }
}
