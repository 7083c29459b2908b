#![forbid(unsafe_code)]

// A timetag is stored as one or two u64 words in the shared timestamp column.
// Everything the store and the analysis code need from a tag goes through
// the `TimeTag` trait, so both encodings share one buffer implementation.

use serde::Deserialize;
use std::fmt;

/// Which record encoding a region holds. Stored in the region header.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// One timestamp per record, in bins of `resolution`.
    Standard = 0,
    /// Coarse clock count plus a fine offset from that clock edge.
    Clocked = 1,
}

impl TagKind {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Standard),
            1 => Some(Self::Clocked),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Clocked => f.write_str("clocked"),
        }
    }
}

/// Capability shared by every timestamp encoding.
///
/// `arrival_bins` maps a tag onto a single monotone axis measured in the
/// buffer's finest bins. Searching, ordering and every coincidence
/// computation work on that axis only.
pub trait TimeTag: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: TagKind;

    /// Number of u64 words one tag occupies in the timestamp column (1 or 2).
    const WORDS: usize;

    fn arrival_bins(&self, conversion_factor: u64) -> u64;

    /// Storage codec. Only the first `WORDS` entries are meaningful.
    fn to_words(&self) -> [u64; 2];

    fn from_words(words: [u64; 2]) -> Self;

    /// Arrival time in seconds.
    #[inline]
    fn as_time(&self, conversion_factor: u64, resolution: f64) -> f64 {
        time_from_bins(resolution, self.arrival_bins(conversion_factor))
    }
}

// repr(transparent) -> same layout as the bare u64
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StandardTag(pub u64);

impl TimeTag for StandardTag {
    const KIND: TagKind = TagKind::Standard;
    const WORDS: usize = 1;

    #[inline]
    fn arrival_bins(&self, _conversion_factor: u64) -> u64 {
        self.0
    }

    #[inline]
    fn to_words(&self) -> [u64; 2] {
        [self.0, 0]
    }

    #[inline]
    fn from_words(words: [u64; 2]) -> Self {
        Self(words[0])
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ClockedTag {
    /// Coarse clock edges counted since the start of acquisition.
    pub clock: u64,
    /// Fine bins elapsed since that clock edge.
    pub delta: u64,
}

impl ClockedTag {
    pub fn new(clock: u64, delta: u64) -> Self {
        Self { clock, delta }
    }
}

impl TimeTag for ClockedTag {
    const KIND: TagKind = TagKind::Clocked;
    const WORDS: usize = 2;

    // saturating keeps the axis monotone even for absurd clock counts
    #[inline]
    fn arrival_bins(&self, conversion_factor: u64) -> u64 {
        self.clock
            .saturating_mul(conversion_factor)
            .saturating_add(self.delta)
    }

    #[inline]
    fn to_words(&self) -> [u64; 2] {
        [self.clock, self.delta]
    }

    #[inline]
    fn from_words(words: [u64; 2]) -> Self {
        Self {
            clock: words[0],
            delta: words[1],
        }
    }
}

/// Seconds to bins, rounded to the nearest bin.
///
/// The float-to-int cast saturates: negative or NaN input gives 0 and
/// anything past `u64::MAX` bins gives `u64::MAX`.
#[inline]
pub fn bins_from_time(resolution: f64, seconds: f64) -> u64 {
    (seconds / resolution).round() as u64
}

/// Like [`bins_from_time`] but keeps the sign, for channel delays.
#[inline]
pub fn bins_from_time_signed(resolution: f64, seconds: f64) -> i64 {
    (seconds / resolution).round() as i64
}

#[inline]
pub fn time_from_bins(resolution: f64, bins: u64) -> f64 {
    bins as f64 * resolution
}

/// Fine bins per coarse clock period, `round(clock_period / resolution)`.
#[inline]
pub fn conversion_factor(clock_period: f64, resolution: f64) -> u64 {
    (clock_period / resolution).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn tags_are_pod_sized() {
        assert_eq!(size_of::<StandardTag>(), 8);
        assert_eq!(size_of::<ClockedTag>(), 16);
        assert_eq!(StandardTag::WORDS * 8, size_of::<StandardTag>());
        assert_eq!(ClockedTag::WORDS * 8, size_of::<ClockedTag>());
    }

    #[test]
    fn clocked_arrival_combines_clock_and_delta() {
        let cf = conversion_factor(1e-9, 1e-12);
        assert_eq!(cf, 1000);
        let tag = ClockedTag::new(1, 500);
        assert_eq!(tag.arrival_bins(cf), 1500);
        assert!((tag.as_time(cf, 1e-12) - 1.5e-9).abs() < 1e-18);
    }

    #[test]
    fn standard_arrival_is_the_timestamp() {
        let tag = StandardTag(42);
        assert_eq!(tag.arrival_bins(1), 42);
        assert_eq!(tag.arrival_bins(1000), 42);
    }

    #[test]
    fn bins_round_to_nearest() {
        assert_eq!(bins_from_time(1e-12, 1.4e-12), 1);
        assert_eq!(bins_from_time(1e-12, 1.6e-12), 2);
        assert_eq!(bins_from_time(1e-12, -5e-12), 0);
        assert_eq!(bins_from_time(1e-12, f64::NAN), 0);
        assert_eq!(bins_from_time_signed(1e-12, -5e-12), -5);
        assert_eq!(time_from_bins(1e-12, 250), 250.0 * 1e-12);
    }

    #[test]
    fn words_codec_keeps_both_fields() {
        let tag = ClockedTag::new(u64::MAX - 1, 7);
        assert_eq!(ClockedTag::from_words(tag.to_words()), tag);
        assert_eq!(StandardTag::from_words([9, 123]), StandardTag(9));
    }

    #[test]
    fn kind_discriminants_are_stable() {
        assert_eq!(TagKind::Standard.as_u8(), 0);
        assert_eq!(TagKind::Clocked.as_u8(), 1);
        assert_eq!(TagKind::from_u8(1), Some(TagKind::Clocked));
        assert_eq!(TagKind::from_u8(2), None);
    }
}
