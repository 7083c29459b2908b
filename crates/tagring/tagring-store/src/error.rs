use std::io;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid buffer configuration: {0}")]
    Config(&'static str),

    #[error("invalid region name {0:?}")]
    InvalidName(String),

    #[error("shared region '{0}' does not exist")]
    NotFound(String),

    #[error("shared region '{0}' already exists")]
    AlreadyExists(String),

    #[error("failed to map shared region '{name}'")]
    Mapping {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("shared region '{name}' has an incompatible layout: {reason}")]
    Layout { name: String, reason: &'static str },

    #[error("length mismatch: expected {expected}, got {actual}")]
    CapacityMismatch { expected: u64, actual: u64 },

    #[error("invalid range [{start}, {stop})")]
    InvalidRange { start: u64, stop: u64 },

    #[error("write at {start} is not at the buffer head {count}")]
    NotAtHead { start: u64, count: u64 },

    #[error("records from {start} were overwritten, oldest retained is {oldest}")]
    Overrun { start: u64, oldest: u64 },
}

impl StoreError {
    pub(crate) fn on_create(name: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(name.to_owned()),
            _ => Self::mapping(name, source),
        }
    }

    pub(crate) fn on_open(name: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(name.to_owned()),
            _ => Self::mapping(name, source),
        }
    }

    pub(crate) fn mapping(name: &str, source: io::Error) -> Self {
        Self::Mapping {
            name: name.to_owned(),
            source,
        }
    }
}
