mod buffer;
mod error;
mod ring;
mod search;
mod shm_layout;

pub use buffer::{BufferSpec, ClockedBuffer, StandardBuffer, TagBuffer};
pub use error::{Result, StoreError};
pub use ring::{CircularIterator, check_retained, oldest_index};
pub use shm_layout::{REGION_MAGIC, REGION_VERSION, RegionHeader, RegionLayout};
pub use tagring_events::{ClockedTag, Record, Records, StandardTag, TagKind, TimeTag};
