use crate::{
    disk::{BlockDevice, BlockId},
    fs::{
        alloc::{mismatch, padded_block, Allocation, AllocationMethod, AllocationStrategy, Layout},
        bitmap::FreeSpaceBitmap,
        error::{FileSystemError, Result},
    },
};

/// 连续分配：文件占用一段相邻块，顺序访问 O(1)，但有外部碎片
#[derive(Debug)]
pub struct Contiguous {
    block_size: usize,
}

impl Contiguous {
    pub fn new(block_size: usize) -> Self {
        Self { block_size }
    }

    fn extent(&self, allocation: &Allocation) -> Result<(BlockId, usize)> {
        match *allocation {
            Allocation::Contiguous {
                start_block,
                block_count,
            } => Ok((start_block, block_count)),
            ref other => Err(mismatch(AllocationMethod::Contiguous, other)),
        }
    }
}

impl AllocationStrategy for Contiguous {
    fn method(&self) -> AllocationMethod {
        AllocationMethod::Contiguous
    }

    fn blocks_required(&self, len: usize) -> usize {
        len.div_ceil(self.block_size).max(1)
    }

    fn layout(&mut self, bitmap: &FreeSpaceBitmap, len: usize) -> Result<Layout> {
        let required = self.blocks_required(len);
        // 不做碎片整理，找不到足够长的连续段就失败
        let blocks = bitmap
            .find_run(required)
            .ok_or(FileSystemError::InsufficientSpace { required })?;
        Ok(Layout {
            allocation: Allocation::Contiguous {
                start_block: blocks[0],
                block_count: required,
            },
            blocks,
        })
    }

    fn encode(&self, disk: &mut dyn BlockDevice, layout: &Layout, data: &[u8]) -> Result<()> {
        let mut chunks = data.chunks(self.block_size);
        for &block in &layout.blocks {
            let chunk = chunks.next().unwrap_or(&[]);
            disk.write_block(block, &padded_block(self.block_size, chunk))?;
        }
        Ok(())
    }

    fn decode(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<u8>> {
        let (start, count) = self.extent(allocation)?;
        let mut data = Vec::with_capacity(count * self.block_size);
        for block in start..start + count {
            data.extend_from_slice(disk.read_block(block)?);
        }
        Ok(data)
    }

    fn walk(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<BlockId>> {
        let (start, count) = self.extent(allocation)?;
        if start + count > disk.block_count() {
            return Err(FileSystemError::Corrupted(format!(
                "extent {}..{} runs past the end of the disk",
                start,
                start + count
            )));
        }
        Ok((start..start + count).collect())
    }
}
