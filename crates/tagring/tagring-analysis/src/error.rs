use tagring_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MeasurementError {
    #[error("a measurement needs at least one channel")]
    NoChannels,

    #[error("channel {0} is listed more than once")]
    DuplicateChannel(u8),

    #[error("{delays} delays given for {channels} channels")]
    DelayCount { channels: usize, delays: usize },

    #[error("delay {index} is not finite: {value}")]
    InvalidDelay { index: usize, value: f64 },

    #[error("coincidence radius must be finite and non-negative, got {0}")]
    InvalidRadius(f64),

    #[error("read time must be finite and non-negative, got {0}")]
    InvalidReadTime(f64),

    #[error("{0} must be positive and finite")]
    InvalidWindow(&'static str),

    #[error("histogram resolution {resolution} is too coarse for a {window} s window")]
    TooFewBins { window: f64, resolution: f64 },

    #[error("histogram of {bins} bins exceeds the limit of {limit}")]
    HistogramTooLarge { bins: u64, limit: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
