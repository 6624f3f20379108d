use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockDevice, BlockId},
    fs::{
        alloc::AllocationMethod,
        config::FsConfig,
        error::{FileSystemError, Result},
    },
};

pub const FS_TYPE: &str = "AllocFS";
pub const MAGIC: u64 = 0xA110_CF5B;

// 长度前缀占用的字节数
const LEN_PREFIX: usize = 8;

/// 存放在分配表块中的文件系统总体信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub fs_type: String,          // 文件系统标识
    pub magic: u64,               // 魔数，用于识别文件系统
    pub block_size: u64,          // 每块大小（字节）
    pub total_blocks: u64,        // 总块数
    pub method: AllocationMethod, // 当前分配方式
    pub max_blocks_per_file: u64, // 单文件块数上限
    pub file_count: u64,          // 文件表项数
    pub used_blocks: u64,         // 位图中已使用的块数
}

impl SuperBlock {
    pub fn new(config: &FsConfig) -> Self {
        Self {
            fs_type: FS_TYPE.to_string(),
            magic: MAGIC,
            block_size: config.block_size as u64,
            total_blocks: config.block_count as u64,
            method: config.method,
            max_blocks_per_file: config.max_blocks_per_file as u64,
            file_count: 0,
            used_blocks: 0,
        }
    }

    /// 序列化后写入块，前 8 字节是小端长度
    pub fn sync(&self, disk: &mut dyn BlockDevice, block_id: BlockId) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| FileSystemError::Corrupted(format!("super block encode: {}", e)))?;
        let block_size = disk.block_size();
        if bytes.len() + LEN_PREFIX > block_size {
            return Err(FileSystemError::InvalidConfig(format!(
                "super block needs {} bytes, block holds {}",
                bytes.len() + LEN_PREFIX,
                block_size
            )));
        }

        let mut block_buf = vec![0u8; block_size];
        block_buf[..LEN_PREFIX].copy_from_slice(&(bytes.len() as u64).to_le_bytes());
        block_buf[LEN_PREFIX..LEN_PREFIX + bytes.len()].copy_from_slice(&bytes);
        disk.write_block(block_id, &block_buf)?;
        Ok(())
    }

    pub fn load(disk: &dyn BlockDevice, block_id: BlockId) -> Result<Self> {
        let block_buf = disk.read_block(block_id)?;
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&block_buf[..LEN_PREFIX]);
        let serialized_len = u64::from_le_bytes(len_bytes) as usize;
        if serialized_len == 0 || serialized_len > block_buf.len() - LEN_PREFIX {
            return Err(FileSystemError::Corrupted(
                "allocation table block holds no super block".to_string(),
            ));
        }

        let super_block: SuperBlock =
            bincode::deserialize(&block_buf[LEN_PREFIX..LEN_PREFIX + serialized_len])
                .map_err(|e| FileSystemError::Corrupted(format!("super block decode: {}", e)))?;
        if super_block.magic != MAGIC {
            return Err(FileSystemError::Corrupted(format!(
                "bad magic {:#x}",
                super_block.magic
            )));
        }
        Ok(super_block)
    }
}
