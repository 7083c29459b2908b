//! Shared memory layout of a timetag region.
//!
//! The region is a fixed header followed by two parallel columns. Record `i`
//! (logical index, never wrapped) lives in slot `i % capacity` of both.
//!
//! # Memory Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        RegionHeader (64B)                          │
//! │  resolution │ clock_period │ conversion_factor │ capacity          │
//! │  count (atomic) │ reference_count (atomic)                         │
//! │  channel_count │ kind │ version │ magic │ head (atomic)            │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  channels: [u8; capacity]                                          │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  padding to an 8 byte boundary                                     │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  timestamps: [u64; capacity * WORDS]                               │
//! │    standard: one word per slot                                     │
//! │    clocked:  clock, delta per slot                                 │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

use std::mem::size_of;
use std::sync::atomic::{AtomicI64, AtomicU64};
use tagring_events::{TagKind, TimeTag};

/// Magic number identifying a timetag region.
///
/// ASCII "TAGR": `0x5441_4752`.
pub const REGION_MAGIC: u32 = 0x5441_4752;

/// Current region format version.
///
/// Readers reject regions with a different version.
pub const REGION_VERSION: u16 = 1;

/// Header stored at offset 0 of every region.
///
/// The first seven fields describe the buffer; the trailing ones let an
/// attaching process reject regions it cannot interpret.
#[repr(C)]
pub struct RegionHeader {
    /// Seconds per bin. For clocked regions, seconds per fine bin.
    pub resolution: f64,

    /// Coarse clock period in seconds. `0.0` for standard regions.
    pub clock_period: f64,

    /// Fine bins per coarse clock period. `1` for standard regions.
    pub conversion_factor: u64,

    /// Number of slots. Fixed at creation, not necessarily a power of two.
    pub capacity: u64,

    /// Records ever appended. Published by the writer with release ordering.
    pub count: AtomicU64,

    /// Live attachments across all processes.
    pub reference_count: AtomicI64,

    pub channel_count: u8,

    /// [`TagKind`] discriminant.
    pub kind: u8,

    pub version: u16,

    pub magic: u32,

    /// End of the range the writer is currently filling. Runs ahead of
    /// `count` while a push is in flight, so readers can tell which slots
    /// may already be overwritten.
    pub head: AtomicU64,
}

impl RegionHeader {
    /// Validates the header against the encoding `T` and the mapped length.
    ///
    /// Called when attaching to an existing region.
    pub fn validate<T: TimeTag>(&self, mapped_len: usize) -> Result<(), &'static str> {
        if self.magic != REGION_MAGIC {
            return Err("bad magic");
        }
        if self.version != REGION_VERSION {
            return Err("wrong version");
        }
        if TagKind::from_u8(self.kind) != Some(T::KIND) {
            return Err("record encoding mismatch");
        }
        if self.capacity == 0 {
            return Err("zero capacity");
        }
        if self.conversion_factor == 0 {
            return Err("zero conversion factor");
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err("resolution must be positive");
        }
        match RegionLayout::new::<T>(self.capacity) {
            Some(layout) if layout.total <= mapped_len => Ok(()),
            _ => Err("region smaller than its declared capacity"),
        }
    }
}

/// Byte offsets of the columns for a given capacity and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    pub capacity: usize,
    pub words: usize,
    pub channels_offset: usize,
    pub timestamps_offset: usize,
    pub total: usize,
}

impl RegionLayout {
    /// `None` when the region would not fit in the address space.
    pub fn new<T: TimeTag>(capacity: u64) -> Option<Self> {
        let capacity = usize::try_from(capacity).ok()?;
        let channels_offset = size_of::<RegionHeader>();
        let channels_end = channels_offset.checked_add(capacity)?;
        let timestamps_offset = channels_end.checked_next_multiple_of(size_of::<u64>())?;
        let timestamp_bytes = capacity
            .checked_mul(T::WORDS)?
            .checked_mul(size_of::<u64>())?;
        let total = timestamps_offset.checked_add(timestamp_bytes)?;
        Some(Self {
            capacity,
            words: T::WORDS,
            channels_offset,
            timestamps_offset,
            total,
        })
    }
}
