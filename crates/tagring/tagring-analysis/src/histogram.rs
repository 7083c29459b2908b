//! Joint delay histogram for heralded three-channel measurements.
//!
//! Every coincidence among (clock, signal, idler) lands in cell
//! `(x, y) = (|t_clock - t_idler|, |t_clock - t_signal|)` with delay-corrected
//! arrival times. Both coordinates are below the window diameter by
//! construction, so the histogram is a `diameter x diameter` grid.

use crate::error::MeasurementError;
use crate::measurement::Measurement;
use crate::pattern::{PatternCursors, diameter_bins};
use tagring_events::TimeTag;
use tagring_store::TagBuffer;
use tracing::debug;

/// Most bins any histogram in this crate allocates.
pub const MAX_HISTOGRAM_BINS: u64 = 1 << 24;

/// Fails with `HistogramTooLarge` unless `bins` fits under
/// [`MAX_HISTOGRAM_BINS`].
pub(crate) fn check_bins(bins: Option<u64>) -> Result<usize, MeasurementError> {
    bins.filter(|&n| n <= MAX_HISTOGRAM_BINS)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(MeasurementError::HistogramTooLarge {
            bins: bins.unwrap_or(u64::MAX),
            limit: MAX_HISTOGRAM_BINS,
        })
}

/// Square histogram stored row major: `data[x * size + y]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Histogram2d {
    size: usize,
    data: Vec<u64>,
}

impl Histogram2d {
    /// An empty `size x size` grid. Fails with `HistogramTooLarge` past
    /// [`MAX_HISTOGRAM_BINS`] cells.
    pub fn new(size: usize) -> Result<Self, MeasurementError> {
        let side = size as u64;
        let cells = check_bins(side.checked_mul(side))?;
        Ok(Self {
            size,
            data: vec![0; cells],
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &[u64] {
        &self.data
    }

    /// `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<u64> {
        (x < self.size && y < self.size).then(|| self.data[x * self.size + y])
    }

    fn increment(&mut self, x: usize, y: usize) -> bool {
        if x < self.size && y < self.size {
            self.data[x * self.size + y] += 1;
            true
        } else {
            false
        }
    }

    pub fn total(&self) -> u64 {
        self.data.iter().sum()
    }

    /// Sums blocks of `bin_width x bin_width` cells. A partial block at the
    /// edge becomes its own cell. A width of 0 is treated as 1.
    pub fn rebin(&self, bin_width: usize) -> Histogram2d {
        let width = bin_width.max(1);
        let size = self.size.div_ceil(width);
        let mut out = Histogram2d {
            size,
            data: vec![0; size * size],
        };
        for x in 0..self.size {
            for y in 0..self.size {
                let n = self.data[x * self.size + y];
                out.data[(x / width) * out.size + y / width] += n;
            }
        }
        out
    }

    /// Counts per idler delay (`x`), summed over signal delay.
    pub fn idler_marginal(&self) -> Vec<u64> {
        self.data
            .chunks(self.size.max(1))
            .map(|row| row.iter().sum())
            .collect()
    }

    /// Counts per signal delay (`y`), summed over idler delay.
    pub fn signal_marginal(&self) -> Vec<u64> {
        let mut out = vec![0; self.size];
        for row in self.data.chunks(self.size.max(1)) {
            for (acc, n) in out.iter_mut().zip(row) {
                *acc += n;
            }
        }
        out
    }

    /// Rolls the grid so the populated region of each marginal sits on the
    /// central bin `size / 2`.
    ///
    /// The centre of an axis is the mean position of the marginal bins
    /// holding more than a tenth of its peak. Cells rolled past an edge wrap
    /// around. An empty histogram is returned unchanged.
    pub fn centred(&self) -> Histogram2d {
        let (Some(dx), Some(dy)) = (
            centring_shift(&self.idler_marginal()),
            centring_shift(&self.signal_marginal()),
        ) else {
            return self.clone();
        };
        let n = self.size;
        let mut out = Histogram2d {
            size: n,
            data: vec![0; self.data.len()],
        };
        for x in 0..n {
            for y in 0..n {
                let to_x = (x + dx) % n;
                let to_y = (y + dy) % n;
                out.data[to_x * n + to_y] = self.data[x * n + y];
            }
        }
        out
    }
}

/// Forward roll, in `[0, len)`, that moves the weighted middle of
/// `marginal` onto `len / 2`. `None` for an all-zero marginal.
fn centring_shift(marginal: &[u64]) -> Option<usize> {
    let peak = marginal.iter().copied().max().filter(|&p| p > 0)?;
    let len = marginal.len() as i64;
    let central = len / 2;
    let (sum, hits) = marginal
        .iter()
        .enumerate()
        .filter(|&(_, &n)| n as f64 > 0.1 * peak as f64)
        .fold((0i64, 0i64), |(sum, hits), (i, _)| {
            (sum + i as i64 - central, hits + 1)
        });
    let offset = (sum as f64 / hits as f64).round() as i64;
    Some((-offset).rem_euclid(len) as usize)
}

/// Accumulates a [`Histogram2d`] over repeated collections.
#[derive(Debug, Clone)]
pub struct JointDelayHistogram {
    measurement: Measurement,
    clock: u8,
    signal: u8,
    idler: u8,
    histogram: Histogram2d,
}

impl JointDelayHistogram {
    /// The three role channels should all appear in the measurement's
    /// channel list; if one does not, [`collect`](Self::collect) records
    /// nothing.
    pub fn new(measurement: Measurement, clock: u8, signal: u8, idler: u8) -> Self {
        Self {
            measurement,
            clock,
            signal,
            idler,
            histogram: Histogram2d::default(),
        }
    }

    pub fn histogram(&self) -> &Histogram2d {
        &self.histogram
    }

    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    pub fn reset(&mut self) {
        self.histogram.data.fill(0);
    }

    /// Adds every coincidence in the read window to the histogram and
    /// returns how many were added.
    ///
    /// The grid is sized to the window diameter of `buffer` and is cleared
    /// whenever that diameter changes. Fails with `HistogramTooLarge` when
    /// the grid would pass [`MAX_HISTOGRAM_BINS`], and with an `Overrun`
    /// store error when the writer replaced part of the window meanwhile, in
    /// which case the histogram is left as it was.
    pub fn collect<T: TimeTag>(&mut self, buffer: &TagBuffer<T>) -> Result<u64, MeasurementError> {
        let m = &self.measurement;
        let (Some(clock), Some(signal), Some(idler)) = (
            m.position(self.clock),
            m.position(self.signal),
            m.position(self.idler),
        ) else {
            return Ok(0);
        };

        let diameter = diameter_bins(buffer, m);
        check_bins(diameter.checked_mul(diameter))?;
        let size = usize::try_from(diameter).map_err(|_| MeasurementError::HistogramTooLarge {
            bins: u64::MAX,
            limit: MAX_HISTOGRAM_BINS,
        })?;
        if self.histogram.size != size {
            self.histogram = Histogram2d::new(size)?;
        }

        let Some(mut cursors) = PatternCursors::new(buffer, m)? else {
            return Ok(0);
        };
        let mut cells = Vec::new();
        cursors.walk(buffer, |matched| {
            let t_clock = matched[clock].adjusted();
            let x = t_clock.abs_diff(matched[idler].adjusted()) as usize;
            let y = t_clock.abs_diff(matched[signal].adjusted()) as usize;
            cells.push((x, y));
        })?;

        let mut added = 0;
        for (x, y) in cells {
            if self.histogram.increment(x, y) {
                added += 1;
            }
        }

        debug!(
            target: "tagring::analysis",
            clock = self.clock,
            signal = self.signal,
            idler = self.idler,
            size,
            added,
            "joint histogram collect"
        );
        Ok(added)
    }
}
