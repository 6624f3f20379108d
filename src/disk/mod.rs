pub mod block_device;
pub mod error;
pub mod mem_disk;
pub mod types;

pub use block_device::BlockDevice;
pub use error::DiskError;
pub use mem_disk::MemDisk;
pub use types::{Block, BlockId, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE};
