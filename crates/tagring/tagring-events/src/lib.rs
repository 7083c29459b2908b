pub mod record;
pub mod timetag;

pub use record::{Record, Records};
pub use timetag::{
    ClockedTag, StandardTag, TagKind, TimeTag, bins_from_time, bins_from_time_signed,
    conversion_factor, time_from_bins,
};
