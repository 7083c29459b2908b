//! Coincidence counting and collection.
//!
//! A coincidence is one record from every configured channel, all within one
//! window diameter (`2 * radius`) of each other after delay correction. Each
//! record takes part in at most one coincidence as the oldest member.

use crate::measurement::Measurement;
use crate::pattern::PatternCursors;
use tagring_events::TimeTag;
use tagring_store::{Result, TagBuffer};
use tracing::debug;

/// Counts coincidences among the records of the last `read_time` seconds.
///
/// Yields 0 when the buffer is empty or a channel has no records in range,
/// and `Overrun` when the writer replaced part of the window during the
/// count.
pub fn count<T: TimeTag>(buffer: &TagBuffer<T>, measurement: &Measurement) -> Result<u64> {
    let Some(mut cursors) = PatternCursors::new(buffer, measurement)? else {
        return Ok(0);
    };
    let found = cursors.walk(buffer, |_| {})?;
    debug!(
        target: "tagring::analysis",
        channels = ?measurement.channels(),
        diameter = cursors.diameter(),
        found,
        "coincidence count"
    );
    Ok(found)
}

/// Like [`count`], and also stores the timestamps of every coincidence.
///
/// `out` is cleared first. Each coincidence appends one native timestamp per
/// configured channel, in channel-list order, so `out.len()` ends up as
/// `found * channels.len()`. On error `out` is left empty.
pub fn collect<T: TimeTag>(
    buffer: &TagBuffer<T>,
    measurement: &Measurement,
    out: &mut Vec<T>,
) -> Result<u64> {
    out.clear();
    let Some(mut cursors) = PatternCursors::new(buffer, measurement)? else {
        return Ok(0);
    };
    let walked = cursors.walk(buffer, |matched| {
        out.extend(matched.iter().map(|c| buffer.timestamp_at(c.slot)));
    });
    let found = match walked {
        Ok(found) => found,
        Err(err) => {
            out.clear();
            return Err(err);
        }
    };
    debug!(
        target: "tagring::analysis",
        channels = ?measurement.channels(),
        found,
        collected = out.len(),
        "coincidence collect"
    );
    Ok(found)
}
