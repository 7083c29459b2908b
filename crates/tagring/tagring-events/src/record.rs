#![forbid(unsafe_code)]

use crate::timetag::TimeTag;

/// One detection event in row form, as decoders produce them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Record<T> {
    pub channel: u8,
    pub timestamp: T,
}

impl<T: TimeTag> Record<T> {
    pub fn new(channel: u8, timestamp: T) -> Self {
        Self { channel, timestamp }
    }

    #[inline]
    pub fn arrival_bins(&self, conversion_factor: u64) -> u64 {
        self.timestamp.arrival_bins(conversion_factor)
    }
}

/// A run of records in column form, the shape the shared buffer stores.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Records<T> {
    pub channels: Vec<u8>,
    pub timestamps: Vec<T>,
}

impl<T: TimeTag> Records<T> {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            channels: Vec::with_capacity(n),
            timestamps: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, record: Record<T>) {
        self.channels.push(record.channel);
        self.timestamps.push(record.timestamp);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Record<T>> {
        Some(Record {
            channel: *self.channels.get(i)?,
            timestamp: *self.timestamps.get(i)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Record<T>> + '_ {
        self.channels
            .iter()
            .zip(&self.timestamps)
            .map(|(&channel, &timestamp)| Record { channel, timestamp })
    }
}

impl<T: TimeTag> FromIterator<Record<T>> for Records<T> {
    fn from_iter<I: IntoIterator<Item = Record<T>>>(iter: I) -> Self {
        let mut out = Records::default();
        for record in iter {
            out.push(record);
        }
        out
    }
}
