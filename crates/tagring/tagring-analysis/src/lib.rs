pub mod coincidence;
mod error;
mod histogram;
mod measurement;
mod pattern;
mod singles;
mod timetrace;
mod zero_delay;

pub use error::MeasurementError;
pub use histogram::{Histogram2d, JointDelayHistogram, MAX_HISTOGRAM_BINS};
pub use measurement::{Measurement, MeasurementBuilder};
pub use singles::{Singles, singles, singles_over};
pub use timetrace::timetrace;
pub use zero_delay::{
    ZeroDelay, ZeroDelayHistogram, ZeroDelayResult, find_zero_delay, zero_delay_histogram,
};
