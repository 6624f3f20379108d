use thiserror::Error;

use crate::disk::{BlockId, DiskError};

/// 文件系统错误类型，每个公开操作都以具体的错误种类失败，从不静默吞掉
#[derive(Error, Debug)]
pub enum FileSystemError {
    /// 文件名不满足长度或字符集约束
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    /// 文件内容超过单文件块数上限
    #[error("File size {size} bytes exceeds the limit of {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    /// 当前分配策略找不到满足形状要求的空闲块
    #[error("Not enough space: {required} free blocks required")]
    InsufficientSpace { required: usize },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    /// 链式遍历超过 N 步仍未遇到结束标记，或指针越界
    #[error("Corrupt chain starting at block {start}")]
    CorruptChain { start: BlockId },

    /// 索引块中出现越界或保留块号
    #[error("Corrupt index block {index_block}: entry {entry} is not a data block")]
    CorruptIndex { index_block: BlockId, entry: usize },

    #[error("File system corrupted: {0}")]
    Corrupted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 块设备契约违规（OutOfRange / SizeMismatch）
    #[error(transparent)]
    Disk(#[from] DiskError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
