use crate::disk::{
    block_device::BlockDevice,
    error::{DiskError, Result},
    types::BlockId,
};

/// 内存中的模拟磁盘：N 个定长块扁平存放在一个 Vec 里，进程退出即消失。
#[derive(Debug, Clone)]
pub struct MemDisk {
    blocks: Vec<u8>,    // 扁平化存储，长度 = block_size * block_count
    block_size: usize,  // 每块字节数
    block_count: usize, // 块总数
}

impl MemDisk {
    pub fn new(block_size: usize, block_count: usize) -> Self {
        Self {
            blocks: vec![0u8; block_size * block_count],
            block_size,
            block_count,
        }
    }

    fn check_range(&self, block_id: BlockId) -> Result<usize> {
        if block_id >= self.block_count {
            return Err(DiskError::OutOfRange {
                index: block_id,
                count: self.block_count,
            });
        }
        Ok(block_id * self.block_size)
    }
}

impl BlockDevice for MemDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_block(&self, block_id: BlockId) -> Result<&[u8]> {
        let start = self.check_range(block_id)?;
        Ok(&self.blocks[start..start + self.block_size])
    }

    fn write_block(&mut self, block_id: BlockId, buf: &[u8]) -> Result<()> {
        let start = self.check_range(block_id)?;
        if buf.len() != self.block_size {
            return Err(DiskError::SizeMismatch {
                expected: self.block_size,
                actual: buf.len(),
            });
        }
        // 原地覆盖，模拟扇区写
        self.blocks[start..start + self.block_size].copy_from_slice(buf);
        Ok(())
    }
}
