pub mod disk;
pub mod fs;
pub mod shell;
pub mod utils;

pub use fs::{
    alloc::AllocationMethod,
    config::FsConfig,
    error::{FileSystemError, Result},
    FileSystem,
};
