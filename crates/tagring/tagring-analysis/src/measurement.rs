use crate::error::MeasurementError;
use tagring_config::CoincidenceConfig;

/// A validated coincidence measurement, all times in seconds.
///
/// Built once with [`Measurement::builder`] and reused for any number of
/// queries against any buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    channels: Vec<u8>,
    delays: Vec<f64>,
    radius: f64,
    read_time: f64,
}

impl Measurement {
    pub fn builder() -> MeasurementBuilder {
        MeasurementBuilder::default()
    }

    pub fn channels(&self) -> &[u8] {
        &self.channels
    }

    /// One delay per channel, in channel order.
    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    /// Half width of the coincidence window.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// How far back from the newest record a query looks.
    pub fn read_time(&self) -> f64 {
        self.read_time
    }

    /// Position of `channel` in the channel list.
    pub fn position(&self, channel: u8) -> Option<usize> {
        self.channels.iter().position(|&c| c == channel)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeasurementBuilder {
    channels: Vec<u8>,
    delays: Option<Vec<f64>>,
    radius: f64,
    read_time: f64,
}

impl MeasurementBuilder {
    pub fn channels(mut self, channels: impl Into<Vec<u8>>) -> Self {
        self.channels = channels.into();
        self
    }

    /// Per-channel delays. Left unset, every delay is zero.
    pub fn delays(mut self, delays: impl Into<Vec<f64>>) -> Self {
        self.delays = Some(delays.into());
        self
    }

    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn read_time(mut self, read_time: f64) -> Self {
        self.read_time = read_time;
        self
    }

    pub fn build(self) -> Result<Measurement, MeasurementError> {
        if self.channels.is_empty() {
            return Err(MeasurementError::NoChannels);
        }
        for (i, &channel) in self.channels.iter().enumerate() {
            if self.channels[..i].contains(&channel) {
                return Err(MeasurementError::DuplicateChannel(channel));
            }
        }

        let delays = self
            .delays
            .unwrap_or_else(|| vec![0.0; self.channels.len()]);
        if delays.len() != self.channels.len() {
            return Err(MeasurementError::DelayCount {
                channels: self.channels.len(),
                delays: delays.len(),
            });
        }
        if let Some((index, &value)) = delays.iter().enumerate().find(|(_, d)| !d.is_finite()) {
            return Err(MeasurementError::InvalidDelay { index, value });
        }

        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(MeasurementError::InvalidRadius(self.radius));
        }
        if !(self.read_time.is_finite() && self.read_time >= 0.0) {
            return Err(MeasurementError::InvalidReadTime(self.read_time));
        }

        Ok(Measurement {
            channels: self.channels,
            delays,
            radius: self.radius,
            read_time: self.read_time,
        })
    }
}

impl TryFrom<&CoincidenceConfig> for Measurement {
    type Error = MeasurementError;

    fn try_from(cfg: &CoincidenceConfig) -> Result<Self, Self::Error> {
        let mut builder = Measurement::builder()
            .channels(cfg.channels.clone())
            .radius(cfg.radius)
            .read_time(cfg.read_time);
        if !cfg.delays.is_empty() {
            builder = builder.delays(cfg.delays.clone());
        }
        builder.build()
    }
}
