use crate::disk::{BlockDevice, BlockId, DiskError};

/// 空闲空间位图：每个块一位，1 = 已使用，按 LSB 优先打包在保留的位图块中。
///
/// 保留块（分配表块、位图块）永远不会被分配，它们的位也保持为 0，
/// 因此置位集合恰好等于所有存活文件遍历得到的块集合。
#[derive(Debug, Clone)]
pub struct FreeSpaceBitmap {
    bits: Vec<u8>,           // 位图数据，长度 ceil(total_blocks / 8)
    total_blocks: usize,     // 磁盘块总数
    free_blocks: usize,      // 当前可分配的空闲块数（不含保留块）
    block_id: BlockId,       // 位图在磁盘中的块号
    reserved: Vec<BlockId>,  // 不参与分配的块
}

impl FreeSpaceBitmap {
    pub fn new(block_id: BlockId, total_blocks: usize, reserved: &[BlockId]) -> Self {
        let byte_len = total_blocks.div_ceil(8);
        let free_blocks = (0..total_blocks).filter(|b| !reserved.contains(b)).count();
        Self {
            bits: vec![0; byte_len],
            total_blocks,
            free_blocks,
            block_id,
            reserved: reserved.to_vec(),
        }
    }

    /// 从磁盘上的位图块重建
    pub fn load(
        disk: &dyn BlockDevice,
        block_id: BlockId,
        total_blocks: usize,
        reserved: &[BlockId],
    ) -> Result<Self, DiskError> {
        let mut bitmap = Self::new(block_id, total_blocks, reserved);
        let block = disk.read_block(block_id)?;
        let byte_len = bitmap.bits.len();
        bitmap.bits.copy_from_slice(&block[..byte_len]);
        bitmap.free_blocks = (0..total_blocks).filter(|&b| bitmap.is_free(b)).count();
        Ok(bitmap)
    }

    /// 将位图写回它所在的块，不足一块用 0 填充
    pub fn sync(&self, disk: &mut dyn BlockDevice) -> Result<(), DiskError> {
        let mut block_buf = vec![0u8; disk.block_size()];
        block_buf[..self.bits.len()].copy_from_slice(&self.bits);
        disk.write_block(self.block_id, &block_buf)
    }

    pub fn free_count(&self) -> usize {
        self.free_blocks
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn is_reserved(&self, block_index: BlockId) -> bool {
        self.reserved.contains(&block_index)
    }

    /// 原始位：是否被标记为已使用
    pub fn is_used(&self, block_index: BlockId) -> bool {
        if block_index >= self.total_blocks {
            return false;
        }
        self.bits[block_index / 8] & (1 << (block_index % 8)) != 0
    }

    /// 是否可以分配：在范围内、非保留、未使用
    pub fn is_free(&self, block_index: BlockId) -> bool {
        block_index < self.total_blocks
            && !self.is_reserved(block_index)
            && !self.is_used(block_index)
    }

    pub fn used_blocks(&self) -> Vec<BlockId> {
        (0..self.total_blocks).filter(|&b| self.is_used(b)).collect()
    }

    /// 所有可分配的空闲块，按块号升序
    pub fn free_list(&self) -> Vec<BlockId> {
        (0..self.total_blocks).filter(|&b| self.is_free(b)).collect()
    }

    pub fn mark_used(
        &mut self,
        disk: &mut dyn BlockDevice,
        blocks: &[BlockId],
    ) -> Result<(), DiskError> {
        self.set_bits(blocks, true)?;
        self.sync(disk)
    }

    pub fn mark_free(
        &mut self,
        disk: &mut dyn BlockDevice,
        blocks: &[BlockId],
    ) -> Result<(), DiskError> {
        self.set_bits(blocks, false)?;
        self.sync(disk)
    }

    /// 清空所有位（格式化）
    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.free_blocks = (0..self.total_blocks)
            .filter(|b| !self.reserved.contains(b))
            .count();
    }

    fn set_bits(&mut self, blocks: &[BlockId], used: bool) -> Result<(), DiskError> {
        // 先整体检查范围，保证要么全部修改要么一个不改
        if let Some(&bad) = blocks.iter().find(|&&b| b >= self.total_blocks) {
            return Err(DiskError::OutOfRange {
                index: bad,
                count: self.total_blocks,
            });
        }
        for &block in blocks {
            let byte_index = block / 8;
            let mask = 1u8 << (block % 8);
            let was_used = self.bits[byte_index] & mask != 0;
            if used && !was_used {
                self.bits[byte_index] |= mask;
                if !self.is_reserved(block) {
                    self.free_blocks -= 1;
                }
            } else if !used && was_used {
                self.bits[byte_index] &= !mask;
                if !self.is_reserved(block) {
                    self.free_blocks += 1;
                }
            }
        }
        Ok(())
    }

    /// 从低块号向上找第一段长度为 count 的连续空闲块
    pub fn find_run(&self, count: usize) -> Option<Vec<BlockId>> {
        if count == 0 {
            return Some(Vec::new());
        }
        let mut run_start = 0;
        let mut run_len = 0;
        for block in 0..self.total_blocks {
            if self.is_free(block) {
                if run_len == 0 {
                    run_start = block;
                }
                run_len += 1;
                if run_len == count {
                    return Some((run_start..run_start + count).collect());
                }
            } else {
                run_len = 0;
            }
        }
        None
    }

    /// 任取 count 个空闲块（首次适配，升序），不足则返回 None
    pub fn find_any(&self, count: usize) -> Option<Vec<BlockId>> {
        if count > self.free_blocks {
            return None;
        }
        let blocks: Vec<BlockId> = (0..self.total_blocks)
            .filter(|&b| self.is_free(b))
            .take(count)
            .collect();
        (blocks.len() == count).then_some(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    fn fixture() -> (MemDisk, FreeSpaceBitmap) {
        (MemDisk::new(128, 32), FreeSpaceBitmap::new(1, 32, &[0, 1]))
    }

    #[test]
    fn reserved_blocks_are_never_offered() {
        let (_, bitmap) = fixture();
        assert_eq!(bitmap.free_count(), 30);
        assert_eq!(bitmap.find_run(3), Some(vec![2, 3, 4]));
        assert_eq!(bitmap.find_any(2), Some(vec![2, 3]));
        assert!(!bitmap.is_free(0));
        assert!(!bitmap.is_used(0));
    }

    #[test]
    fn mark_used_persists_into_bitmap_block() {
        let (mut disk, mut bitmap) = fixture();
        bitmap.mark_used(&mut disk, &[2, 9, 31]).unwrap();

        let block = disk.read_block(1).unwrap();
        assert_eq!(block[0], 0b0000_0100);
        assert_eq!(block[1], 0b0000_0010);
        assert_eq!(block[3], 0b1000_0000);
        assert_eq!(bitmap.free_count(), 27);

        let reloaded = FreeSpaceBitmap::load(&disk, 1, 32, &[0, 1]).unwrap();
        assert_eq!(reloaded.used_blocks(), vec![2, 9, 31]);
        assert_eq!(reloaded.free_count(), 27);
    }

    #[test]
    fn find_run_skips_fragments_that_are_too_short() {
        let (mut disk, mut bitmap) = fixture();
        // 空洞：3..5 长度 2，之后 6 被占用
        bitmap.mark_used(&mut disk, &[2, 5, 6]).unwrap();
        assert_eq!(bitmap.find_run(2), Some(vec![3, 4]));
        assert_eq!(bitmap.find_run(3), Some(vec![7, 8, 9]));
        assert_eq!(bitmap.find_run(26), None);
        assert_eq!(bitmap.find_run(25), Some((7..32).collect()));
    }

    #[test]
    fn find_any_ignores_contiguity() {
        let (mut disk, mut bitmap) = fixture();
        let every_other: Vec<BlockId> = (2..32).step_by(2).collect();
        bitmap.mark_used(&mut disk, &every_other).unwrap();
        assert_eq!(bitmap.find_run(2), None);
        assert_eq!(bitmap.find_any(3), Some(vec![3, 5, 7]));
        assert_eq!(bitmap.find_any(16), None);
    }

    #[test]
    fn mark_free_restores_counts() {
        let (mut disk, mut bitmap) = fixture();
        bitmap.mark_used(&mut disk, &[4, 5]).unwrap();
        bitmap.mark_free(&mut disk, &[4, 5]).unwrap();
        assert_eq!(bitmap.free_count(), 30);
        assert!(bitmap.used_blocks().is_empty());
        assert!(disk.read_block(1).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_range_marks_change_nothing() {
        let (mut disk, mut bitmap) = fixture();
        assert!(bitmap.mark_used(&mut disk, &[3, 40]).is_err());
        assert!(bitmap.used_blocks().is_empty());
        assert_eq!(bitmap.free_count(), 30);
    }
}
