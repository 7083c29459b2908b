//! Nearest-neighbour delay histogram between two channels, used to find the
//! relative delay at which their events line up.
//!
//! Every A event is paired with the latest B event before it and vice versa.
//! B-after-A separations fill the upper half of the histogram, A-after-B the
//! lower half:
//!
//! ```text
//! index   0 ........ half-1 | half ........ 2*half-1
//! time    -window .... -w   |  0  ....... window-w
//!         A after B         |  B after A
//! ```

use crate::error::MeasurementError;
use crate::histogram::check_bins;
use tagring_events::TimeTag;
use tagring_store::{CircularIterator, TagBuffer};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroDelay {
    pub channel_a: u8,
    pub channel_b: u8,
    /// Seconds back from the newest record to scan.
    pub read_time: f64,
    /// Largest separation histogrammed, seconds.
    pub correlation_window: f64,
    /// Requested width of one histogram bin, seconds.
    pub resolution: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZeroDelayHistogram {
    /// Lower edge of each bin, `t_b - t_a` in seconds.
    pub times: Vec<f64>,
    pub intensities: Vec<u64>,
    /// Bin width in arrival units of the buffer.
    pub bin_width: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZeroDelayResult {
    pub times: Vec<f64>,
    pub intensities: Vec<u64>,
    /// Lower edge of the fullest bin, `None` if no pair fell in the window.
    pub central_delay: Option<f64>,
    pub max_intensity: u64,
}

/// Histogram geometry in buffer units.
struct Geometry {
    half: u64,
    bin_width: u64,
    window: u64,
}

impl ZeroDelay {
    fn geometry(&self, buffer_resolution: f64) -> Result<Geometry, MeasurementError> {
        if !(self.correlation_window.is_finite() && self.correlation_window > 0.0) {
            return Err(MeasurementError::InvalidWindow("correlation window"));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(MeasurementError::InvalidWindow("histogram resolution"));
        }
        if !(self.read_time.is_finite() && self.read_time >= 0.0) {
            return Err(MeasurementError::InvalidReadTime(self.read_time));
        }

        let too_few = MeasurementError::TooFewBins {
            window: self.correlation_window,
            resolution: self.resolution,
        };
        let half = ((self.correlation_window / self.resolution).round() as u64).saturating_sub(1);
        if half == 0 {
            return Err(too_few);
        }
        check_bins(half.checked_mul(2))?;
        let bin_width = (self.correlation_window / buffer_resolution / half as f64) as u64;
        if bin_width == 0 {
            return Err(too_few);
        }
        Ok(Geometry {
            half,
            bin_width,
            window: half.saturating_mul(bin_width),
        })
    }
}

/// Builds the A/B separation histogram over the last `read_time` seconds.
///
/// The histogram has `2 * (round(window / resolution) - 1)` bins, at most
/// [`MAX_HISTOGRAM_BINS`](crate::MAX_HISTOGRAM_BINS); the bin width is
/// rounded down to whole buffer bins. Fails with an `Overrun` store error
/// when the writer replaced part of the window during the scan.
pub fn zero_delay_histogram<T: TimeTag>(
    buffer: &TagBuffer<T>,
    config: &ZeroDelay,
) -> Result<ZeroDelayHistogram, MeasurementError> {
    let geometry = config.geometry(buffer.resolution())?;
    let Geometry {
        half,
        bin_width,
        window,
    } = geometry;
    let n_bins = (2 * half) as usize;
    let bin_seconds = buffer.time_from_bins(bin_width);

    let mut intensities = vec![0u64; n_bins];
    let times = (0..n_bins)
        .map(|i| (i as f64 - half as f64) * bin_seconds)
        .collect();

    if let Some((count, newest)) = buffer.newest_snapshot() {
        let key = newest.saturating_sub(buffer.bins_from_time(config.read_time));
        let start = buffer.lower_bound_in(key, count);
        let slots = CircularIterator::new(buffer.capacity(), start, count).ok();

        let mut previous_a: Option<u64> = None;
        let mut previous_b: Option<u64> = None;
        for slot in slots.into_iter().flatten() {
            let channel = buffer.channel_at(slot);
            let arrival = buffer.arrival_time_at(slot);
            let bin = if channel == config.channel_a {
                previous_a = Some(arrival);
                previous_b
                    .map(|b| arrival.saturating_sub(b))
                    .filter(|&delta| delta < window)
                    .map(|delta| half - delta / bin_width - 1)
            } else if channel == config.channel_b {
                previous_b = Some(arrival);
                previous_a
                    .map(|a| arrival.saturating_sub(a))
                    .filter(|&delta| delta < window)
                    .map(|delta| half + delta / bin_width)
            } else {
                None
            };
            if let Some(n) = bin.and_then(|i| intensities.get_mut(i as usize)) {
                *n += 1;
            }
        }
        buffer.ensure_retained(start)?;
    }

    debug!(
        target: "tagring::analysis",
        channel_a = config.channel_a,
        channel_b = config.channel_b,
        n_bins,
        bin_width,
        pairs = intensities.iter().sum::<u64>(),
        "zero delay histogram"
    );

    Ok(ZeroDelayHistogram {
        times,
        intensities,
        bin_width,
    })
}

/// Histograms A/B separations and reports the most populated delay.
pub fn find_zero_delay<T: TimeTag>(
    buffer: &TagBuffer<T>,
    config: &ZeroDelay,
) -> Result<ZeroDelayResult, MeasurementError> {
    let ZeroDelayHistogram {
        times, intensities, ..
    } = zero_delay_histogram(buffer, config)?;

    let mut peak: Option<(usize, u64)> = None;
    for (i, &n) in intensities.iter().enumerate() {
        if n > 0 && peak.is_none_or(|(_, best)| n > best) {
            peak = Some((i, n));
        }
    }

    Ok(ZeroDelayResult {
        central_delay: peak.map(|(i, _)| times[i]),
        max_intensity: peak.map_or(0, |(_, n)| n),
        times,
        intensities,
    })
}
