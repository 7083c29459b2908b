mod config;
pub mod logging;

pub use config::{CoincidenceConfig, ConfigError, RegionConfig, TagringConfig};
