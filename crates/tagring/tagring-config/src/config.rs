use serde::Deserialize;
use std::path::{Path, PathBuf};
use tagring_events::TagKind;

#[derive(Deserialize, Debug)]
pub struct TagringConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub region: RegionConfig,
    pub coincidence: Option<CoincidenceConfig>,
}

/// Shape of the shared buffer a producer creates.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RegionConfig {
    #[serde(default = "defaults::region_name")]
    pub name: String,
    /// Directory holding the region. `None` picks `/dev/shm` or the temp dir.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "defaults::encoding")]
    pub encoding: TagKind,
    #[serde(default = "defaults::capacity")]
    pub capacity: u64,
    /// Seconds per (fine) bin.
    #[serde(default = "defaults::resolution")]
    pub resolution: f64,
    /// Coarse clock period in seconds, clocked regions only.
    #[serde(default)]
    pub clock_period: f64,
    #[serde(default = "defaults::channel_count")]
    pub channel_count: u8,
}

/// A coincidence measurement described in seconds.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CoincidenceConfig {
    pub channels: Vec<u8>,
    /// Per-channel delays. Empty means no delays.
    #[serde(default)]
    pub delays: Vec<f64>,
    pub radius: f64,
    #[serde(default = "defaults::read_time")]
    pub read_time: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid log level")]
    LogLevel(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install log subscriber")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

mod defaults {
    use tagring_events::TagKind;

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn region_name() -> String {
        "tagring".into()
    }

    pub fn encoding() -> TagKind {
        TagKind::Standard
    }

    pub fn capacity() -> u64 {
        1 << 20
    }

    pub fn resolution() -> f64 {
        1e-12
    }

    pub fn channel_count() -> u8 {
        4
    }

    pub fn read_time() -> f64 {
        1.0
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: defaults::region_name(),
            root: None,
            encoding: defaults::encoding(),
            capacity: defaults::capacity(),
            resolution: defaults::resolution(),
            clock_period: 0.0,
            channel_count: defaults::channel_count(),
        }
    }
}

impl TagringConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: TagringConfig = toml::from_str(toml_str)?;
        Ok(config)
    }
}
