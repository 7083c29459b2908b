//! Shared timetag buffer: lifecycle, append and random access.
//!
//! One process creates a region and appends to it; any number of processes
//! attach to the same region by name and read from it concurrently.
//!
//! # Design
//! - **Writer**: `push*` take `&mut self`, so a handle appends from one
//!   thread at a time. Only one handle per region should ever push.
//! - **Readers**: every access goes through atomic views of the columns, so
//!   reading slots the writer is replacing yields stale or new values but
//!   never undefined behaviour. Range reads report `Overrun` when the slots
//!   may have been replaced.
//!
//! # Publication protocol
//!
//! **Writer** (push of `[start, stop)`):
//! 1. Store `head = stop`, then a release fence
//! 2. Write channels and timestamps (relaxed)
//! 3. Store `count = stop` with release ordering
//!
//! **Reader** (slice of `[start, stop)`):
//! 1. Load `count` with acquire ordering; `stop` must not exceed it
//! 2. Check `start` against `head - capacity`
//! 3. Copy the slots (relaxed), then an acquire fence
//! 4. Check `start` against `head - capacity` again
//!
//! A reader that copied any value from step 2 of a push also observes that
//! push's `head` in step 4, so torn ranges are always detected.

use crate::error::{Result, StoreError};
use crate::ring::{CircularIterator, check_retained, oldest_index};
use crate::shm_layout::{REGION_MAGIC, REGION_VERSION, RegionHeader, RegionLayout};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering, fence};
use tagring_config::RegionConfig;
use tagring_events::{
    ClockedTag, Record, Records, StandardTag, TagKind, TimeTag, bins_from_time, conversion_factor,
    time_from_bins,
};
use tagring_mmap::{SharedRegion, default_root, validate_name};
use tracing::{debug, info, warn};

pub type StandardBuffer = TagBuffer<StandardTag>;
pub type ClockedBuffer = TagBuffer<ClockedTag>;

/// Parameters a producer chooses when creating a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferSpec {
    pub capacity: u64,
    /// Seconds per bin (fine bin for clocked buffers).
    pub resolution: f64,
    /// Seconds per coarse clock tick. Ignored by standard buffers.
    pub clock_period: f64,
    pub channel_count: u8,
}

impl BufferSpec {
    pub fn standard(capacity: u64, resolution: f64, channel_count: u8) -> Self {
        Self {
            capacity,
            resolution,
            clock_period: 0.0,
            channel_count,
        }
    }

    pub fn clocked(capacity: u64, resolution: f64, clock_period: f64, channel_count: u8) -> Self {
        Self {
            capacity,
            resolution,
            clock_period,
            channel_count,
        }
    }

    /// Returns the conversion factor and clock period stored in the header.
    fn validate(&self, kind: TagKind) -> Result<(u64, f64)> {
        if self.capacity == 0 {
            return Err(StoreError::Config("capacity must be greater than zero"));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(StoreError::Config("resolution must be positive and finite"));
        }
        match kind {
            TagKind::Standard => Ok((1, 0.0)),
            TagKind::Clocked => {
                if !(self.clock_period.is_finite() && self.clock_period > 0.0) {
                    return Err(StoreError::Config(
                        "clock period must be positive and finite",
                    ));
                }
                let factor = conversion_factor(self.clock_period, self.resolution);
                if factor < 1 {
                    return Err(StoreError::Config(
                        "clock period must span at least one fine bin",
                    ));
                }
                Ok((factor, self.clock_period))
            }
        }
    }
}

impl From<&RegionConfig> for BufferSpec {
    fn from(cfg: &RegionConfig) -> Self {
        Self {
            capacity: cfg.capacity,
            resolution: cfg.resolution,
            clock_period: cfg.clock_period,
            channel_count: cfg.channel_count,
        }
    }
}

/// A handle on a shared timetag region.
///
/// Each handle owns its own mapping and one reference on the region. The
/// handle that drops the last reference unlinks the region's name.
pub struct TagBuffer<T: TimeTag> {
    /// Owns the mapping; `base` points into it.
    _region: SharedRegion,
    base: *mut u8,
    layout: RegionLayout,
    capacity: u64,
    root: PathBuf,
    name: String,
    released: bool,
    _pd: PhantomData<T>,
}

// SAFETY: every access to shared memory goes through atomics or the
// immutable descriptive header fields; mutation of the columns needs `&mut self`.
unsafe impl<T: TimeTag> Send for TagBuffer<T> {}
unsafe impl<T: TimeTag> Sync for TagBuffer<T> {}

impl<T: TimeTag> TagBuffer<T> {
    /// Creates a region named `name` under the default root.
    pub fn create(name: &str, spec: BufferSpec) -> Result<Self> {
        Self::create_in(default_root(), name, spec)
    }

    /// Creates a region under `root` and attaches to it.
    ///
    /// The configuration is validated before any shared state is touched.
    /// Fails with `AlreadyExists` if the name is taken.
    pub fn create_in<P: AsRef<Path>>(root: P, name: &str, spec: BufferSpec) -> Result<Self> {
        validate_name(name).map_err(|_| StoreError::InvalidName(name.to_owned()))?;
        let (factor, clock_period) = spec.validate(T::KIND)?;
        let layout = RegionLayout::new::<T>(spec.capacity)
            .ok_or(StoreError::Config("capacity does not fit in memory"))?;

        let root = root.as_ref().to_path_buf();
        let mut region = SharedRegion::create(&root, name, layout.total as u64)
            .map_err(|e| StoreError::on_create(name, e))?;
        let base = region.as_mut_ptr();

        // SAFETY: the region was just created by us, is at least
        // `layout.total` bytes and page aligned; the columns are zero filled.
        unsafe {
            ptr::write(
                base as *mut RegionHeader,
                RegionHeader {
                    resolution: spec.resolution,
                    clock_period,
                    conversion_factor: factor,
                    capacity: spec.capacity,
                    count: AtomicU64::new(0),
                    reference_count: AtomicI64::new(1),
                    channel_count: spec.channel_count,
                    kind: T::KIND.as_u8(),
                    version: REGION_VERSION,
                    magic: REGION_MAGIC,
                    head: AtomicU64::new(0),
                },
            );
        }

        info!(
            target: "tagring::store",
            name,
            kind = %T::KIND,
            capacity = spec.capacity,
            resolution = spec.resolution,
            conversion_factor = factor,
            bytes = layout.total,
            "created region"
        );

        Ok(Self {
            _region: region,
            base,
            layout,
            capacity: spec.capacity,
            root,
            name: name.to_owned(),
            released: false,
            _pd: PhantomData,
        })
    }

    /// Creates the region described by a configuration file section.
    ///
    /// The configured encoding must match `T`.
    pub fn create_from_config(cfg: &RegionConfig) -> Result<Self> {
        if cfg.encoding != T::KIND {
            return Err(StoreError::Config(
                "configured encoding does not match buffer type",
            ));
        }
        let root = cfg.root.clone().unwrap_or_else(default_root);
        Self::create_in(root, &cfg.name, BufferSpec::from(cfg))
    }

    /// Attaches to an existing region under the default root.
    pub fn attach(name: &str) -> Result<Self> {
        Self::attach_in(default_root(), name)
    }

    /// Attaches to an existing region under `root`.
    ///
    /// Fails with `NotFound` if it does not exist and `Layout` if it was not
    /// created as a `TagBuffer<T>`.
    pub fn attach_in<P: AsRef<Path>>(root: P, name: &str) -> Result<Self> {
        validate_name(name).map_err(|_| StoreError::InvalidName(name.to_owned()))?;
        let root = root.as_ref().to_path_buf();
        let mut region =
            SharedRegion::open(&root, name).map_err(|e| StoreError::on_open(name, e))?;

        if region.len() < std::mem::size_of::<RegionHeader>() {
            return Err(StoreError::Layout {
                name: name.to_owned(),
                reason: "region smaller than its header",
            });
        }
        let base = region.as_mut_ptr();

        // SAFETY: the mapping is page aligned and holds at least a header.
        let header = unsafe { &*(base as *const RegionHeader) };
        header
            .validate::<T>(region.len())
            .map_err(|reason| StoreError::Layout {
                name: name.to_owned(),
                reason,
            })?;

        let capacity = header.capacity;
        let layout = RegionLayout::new::<T>(capacity).ok_or(StoreError::Layout {
            name: name.to_owned(),
            reason: "capacity does not fit in memory",
        })?;
        let refs = header.reference_count.fetch_add(1, Ordering::AcqRel) + 1;

        info!(
            target: "tagring::store",
            name,
            kind = %T::KIND,
            capacity,
            count = header.count.load(Ordering::Acquire),
            references = refs,
            "attached to region"
        );

        Ok(Self {
            _region: region,
            base,
            layout,
            capacity,
            root,
            name: name.to_owned(),
            released: false,
            _pd: PhantomData,
        })
    }

    /// Drops this handle's reference.
    ///
    /// Returns `true` if this was the last reference and the region's name
    /// was removed.
    pub fn detach(mut self) -> Result<bool> {
        self.release()
    }

    fn release(&mut self) -> Result<bool> {
        if self.released {
            return Ok(false);
        }
        self.released = true;

        let previous = self.header().reference_count.fetch_sub(1, Ordering::AcqRel);
        if previous > 1 {
            debug!(
                target: "tagring::store",
                name = %self.name,
                references = previous - 1,
                "detached from region"
            );
            return Ok(false);
        }
        if !SharedRegion::exists(&self.root, &self.name) {
            return Ok(false);
        }
        SharedRegion::unlink(&self.root, &self.name)
            .map_err(|e| StoreError::mapping(&self.name, e))?;
        info!(target: "tagring::store", name = %self.name, "released region");
        Ok(true)
    }

    #[inline(always)]
    fn header(&self) -> &RegionHeader {
        // SAFETY: base points to a header that was written or validated on construction
        unsafe { &*(self.base as *const RegionHeader) }
    }

    #[inline(always)]
    fn channel_column(&self) -> &[AtomicU8] {
        // SAFETY: the layout was checked against the mapped length; AtomicU8
        // has the layout of u8 and shared access is atomic.
        unsafe {
            slice::from_raw_parts(
                self.base.add(self.layout.channels_offset) as *const AtomicU8,
                self.layout.capacity,
            )
        }
    }

    #[inline(always)]
    fn timestamp_column(&self) -> &[AtomicU64] {
        // SAFETY: the offset is 8 byte aligned inside a page aligned mapping
        // and the column length was checked against the mapped length.
        unsafe {
            slice::from_raw_parts(
                self.base.add(self.layout.timestamps_offset) as *const AtomicU64,
                self.layout.capacity * self.layout.words,
            )
        }
    }

    /// Appends records at the current head. Returns the number written.
    ///
    /// Fails with `CapacityMismatch` when the slices differ in length or
    /// hold more records than the ring; nothing is written on error.
    pub fn push(&mut self, channels: &[u8], timestamps: &[T]) -> Result<u64> {
        if channels.len() != timestamps.len() {
            return Err(StoreError::CapacityMismatch {
                expected: channels.len() as u64,
                actual: timestamps.len() as u64,
            });
        }
        let start = self.count();
        self.push_range(start, start + channels.len() as u64, channels, timestamps)
    }

    /// Writes records into the logical range `[start, stop)`.
    ///
    /// `stop - start` must equal both slice lengths and `start` must equal
    /// the current count. On error the buffer is unchanged.
    pub fn push_range(
        &mut self,
        start: u64,
        stop: u64,
        channels: &[u8],
        timestamps: &[T],
    ) -> Result<u64> {
        let n = stop
            .checked_sub(start)
            .ok_or(StoreError::InvalidRange { start, stop })?;
        for actual in [channels.len() as u64, timestamps.len() as u64] {
            if actual != n {
                return Err(StoreError::CapacityMismatch { expected: n, actual });
            }
        }
        if n > self.capacity {
            return Err(StoreError::CapacityMismatch {
                expected: self.capacity,
                actual: n,
            });
        }
        let count = self.count();
        if start != count {
            warn!(target: "tagring::store", name = %self.name, start, count, "push not at head");
            return Err(StoreError::NotAtHead { start, count });
        }
        if n == 0 {
            return Ok(0);
        }

        let spans = CircularIterator::new(self.capacity, start, stop)?;
        let (lower, upper) = (spans.lower_span(), spans.upper_span());
        let split = (lower.end - lower.start) as usize;

        let header = self.header();
        header.head.store(stop, Ordering::Relaxed);
        fence(Ordering::Release);

        self.write_slots(lower.start as usize, &channels[..split], &timestamps[..split]);
        if !upper.is_empty() {
            self.write_slots(0, &channels[split..], &timestamps[split..]);
        }

        self.header().count.store(stop, Ordering::Release);
        Ok(n)
    }

    fn write_slots(&mut self, first: usize, channels: &[u8], timestamps: &[T]) {
        let channel_column = self.channel_column();
        let timestamp_column = self.timestamp_column();
        for (k, (&channel, timestamp)) in channels.iter().zip(timestamps).enumerate() {
            let slot = first + k;
            channel_column[slot].store(channel, Ordering::Relaxed);
            let words = timestamp.to_words();
            for (j, word) in words.iter().take(T::WORDS).enumerate() {
                timestamp_column[slot * T::WORDS + j].store(*word, Ordering::Relaxed);
            }
        }
    }

    /// Appends row-form records, splitting them into columns first.
    pub fn push_records(&mut self, records: &[Record<T>]) -> Result<u64> {
        let channels: Vec<u8> = records.iter().map(|r| r.channel).collect();
        let timestamps: Vec<T> = records.iter().map(|r| r.timestamp).collect();
        self.push(&channels, &timestamps)
    }

    pub fn push_record(&mut self, channel: u8, timestamp: T) -> Result<u64> {
        self.push(&[channel], &[timestamp])
    }

    /// Copies logical range `[start, stop)` into the output slices.
    ///
    /// Fails with `InvalidRange` when the range is empty or reaches past the
    /// count, `CapacityMismatch` when an output slice has the wrong length and
    /// `Overrun` when the oldest requested record is, or may have been,
    /// overwritten before the copy finished.
    pub fn slice(
        &self,
        start: u64,
        stop: u64,
        channels_out: &mut [u8],
        timestamps_out: &mut [T],
    ) -> Result<u64> {
        let count = self.count();
        if start >= stop || stop > count {
            return Err(StoreError::InvalidRange { start, stop });
        }
        let n = stop - start;
        for actual in [channels_out.len() as u64, timestamps_out.len() as u64] {
            if actual != n {
                return Err(StoreError::CapacityMismatch { expected: n, actual });
            }
        }
        self.ensure_retained(start)?;

        let slots = CircularIterator::new(self.capacity, start, stop)?;
        for (k, slot) in slots.enumerate() {
            channels_out[k] = self.channel_at(slot);
            timestamps_out[k] = self.timestamp_at(slot);
        }

        self.ensure_retained(start)?;
        Ok(n)
    }

    /// [`slice`](Self::slice) into freshly allocated columns.
    pub fn slice_to_vec(&self, start: u64, stop: u64) -> Result<Records<T>> {
        let count = self.count();
        if start >= stop || stop > count {
            return Err(StoreError::InvalidRange { start, stop });
        }
        self.ensure_retained(start)?;
        let n = (stop - start) as usize;
        let mut out = Records {
            channels: vec![0; n],
            timestamps: vec![T::default(); n],
        };
        self.slice(start, stop, &mut out.channels, &mut out.timestamps)?;
        Ok(out)
    }

    /// Fails with `Overrun` when logical record `start` is, or may have
    /// been, overwritten by a push that has already started.
    ///
    /// Readers that walk slots directly through [`channel_at`](Self::channel_at)
    /// and friends call this once more after the walk: the acquire fence
    /// orders their slot loads before the `head` load, so any value copied
    /// from a later push is reported here.
    pub fn ensure_retained(&self, start: u64) -> Result<()> {
        fence(Ordering::Acquire);
        let head = self.header().head.load(Ordering::Relaxed);
        check_retained(start, head, self.capacity).inspect_err(|_| {
            warn!(
                target: "tagring::store",
                name = %self.name,
                start,
                head,
                capacity = self.capacity,
                "read overrun"
            );
        })
    }

    /// Record in physical slot `absolute`. Panics if `absolute >= capacity`.
    #[inline]
    pub fn record_at(&self, absolute: u64) -> Record<T> {
        Record {
            channel: self.channel_at(absolute),
            timestamp: self.timestamp_at(absolute),
        }
    }

    #[inline]
    pub fn channel_at(&self, absolute: u64) -> u8 {
        self.channel_column()[absolute as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn timestamp_at(&self, absolute: u64) -> T {
        let column = self.timestamp_column();
        let first = absolute as usize * T::WORDS;
        let mut words = [0u64; 2];
        for (j, word) in words.iter_mut().take(T::WORDS).enumerate() {
            *word = column[first + j].load(Ordering::Relaxed);
        }
        T::from_words(words)
    }

    /// Arrival time of slot `absolute`, in fine bins.
    #[inline]
    pub fn arrival_time_at(&self, absolute: u64) -> u64 {
        self.timestamp_at(absolute)
            .arrival_bins(self.conversion_factor())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> TagKind {
        T::KIND
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Records ever appended, loaded with acquire ordering.
    #[inline]
    pub fn count(&self) -> u64 {
        self.header().count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn oldest_index(&self) -> u64 {
        oldest_index(self.count(), self.capacity)
    }

    #[inline]
    pub fn resolution(&self) -> f64 {
        self.header().resolution
    }

    pub fn clock_period(&self) -> f64 {
        self.header().clock_period
    }

    #[inline]
    pub fn conversion_factor(&self) -> u64 {
        self.header().conversion_factor
    }

    pub fn channel_count(&self) -> u8 {
        self.header().channel_count
    }

    pub fn reference_count(&self) -> i64 {
        self.header().reference_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn bins_from_time(&self, seconds: f64) -> u64 {
        bins_from_time(self.resolution(), seconds)
    }

    #[inline]
    pub fn time_from_bins(&self, bins: u64) -> f64 {
        time_from_bins(self.resolution(), bins)
    }

    /// Arrival time of the newest record, `None` while empty.
    pub fn newest_arrival(&self) -> Option<u64> {
        self.newest_snapshot().map(|(_, arrival)| arrival)
    }

    /// The count together with the arrival time of the record just below it,
    /// `None` while empty. Queries that walk the buffer take one snapshot and
    /// stay inside it while the writer moves on.
    pub fn newest_snapshot(&self) -> Option<(u64, u64)> {
        let count = self.count();
        (count > 0).then(|| (count, self.arrival_time_at((count - 1) % self.capacity)))
    }

    /// Arrival time of the oldest retained record, `None` while empty.
    pub fn oldest_arrival(&self) -> Option<u64> {
        let count = self.count();
        (count > 0).then(|| self.arrival_time_at(oldest_index(count, self.capacity) % self.capacity))
    }

    /// Time of the newest record in seconds, `0.0` while empty.
    pub fn current_time(&self) -> f64 {
        self.newest_arrival()
            .map_or(0.0, |bins| self.time_from_bins(bins))
    }

    /// Seconds spanned by the retained records.
    pub fn time_in_buffer(&self) -> f64 {
        match (self.oldest_arrival(), self.newest_arrival()) {
            (Some(oldest), Some(newest)) => self.time_from_bins(newest.saturating_sub(oldest)),
            _ => 0.0,
        }
    }
}

impl<T: TimeTag> Drop for TagBuffer<T> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(target: "tagring::store", name = %self.name, error = %err, "failed to release region");
        }
    }
}
