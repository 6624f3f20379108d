use thiserror::Error;

use crate::disk::types::BlockId;

/// 块设备契约被违反（调用方的编程错误，而非用户错误）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiskError {
    #[error("block {index} is out of range (disk has {count} blocks)")]
    OutOfRange { index: BlockId, count: usize },

    #[error("block write of {actual} bytes, expected exactly {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, DiskError>;
