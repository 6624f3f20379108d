use crate::{
    disk::{BlockDevice, BlockId},
    fs::{
        alloc::{
            mismatch, pointer::PointerCodec, Allocation, AllocationMethod, AllocationStrategy,
            BlockSelector, Layout,
        },
        bitmap::FreeSpaceBitmap,
        error::{FileSystemError, Result},
    },
};

/// 链式分配：每块末尾存放下一块的块号，末块存结束标记
///
/// 块内布局：`[ payload (block_size - w) | next pointer (w) ]`
#[derive(Debug)]
pub struct Chained {
    block_size: usize,
    pointer: PointerCodec,
    selector: BlockSelector,
    reserved: Vec<BlockId>, // 分配表块、位图块，链上不能出现
}

impl Chained {
    pub fn new(
        block_size: usize,
        pointer: PointerCodec,
        selector: BlockSelector,
        reserved: &[BlockId],
    ) -> Self {
        Self {
            block_size,
            pointer,
            selector,
            reserved: reserved.to_vec(),
        }
    }

    /// 每块可用的数据字节数
    pub fn payload_size(&self) -> usize {
        self.block_size - self.pointer.width()
    }

    fn start_of(&self, allocation: &Allocation) -> Result<BlockId> {
        match *allocation {
            Allocation::Chained { start_block } => Ok(start_block),
            ref other => Err(mismatch(AllocationMethod::Chained, other)),
        }
    }

    /// 沿链走到结束标记，对每块的数据区调用 visit；
    /// 走过的块数超过磁盘块数即视为成环，指向越界或保留块同样视为坏链
    fn follow(
        &self,
        disk: &dyn BlockDevice,
        start: BlockId,
        mut visit: impl FnMut(&[u8]),
    ) -> Result<Vec<BlockId>> {
        let limit = disk.block_count();
        let payload = self.payload_size();
        let mut visited = Vec::new();
        let mut current = Some(start);

        while let Some(block) = current {
            if visited.len() >= limit || block >= limit || self.reserved.contains(&block) {
                return Err(FileSystemError::CorruptChain { start });
            }
            let buf = disk.read_block(block)?;
            visit(&buf[..payload]);
            current = self.pointer.read(&buf[payload..]);
            visited.push(block);
        }
        Ok(visited)
    }
}

impl AllocationStrategy for Chained {
    fn method(&self) -> AllocationMethod {
        AllocationMethod::Chained
    }

    fn blocks_required(&self, len: usize) -> usize {
        len.div_ceil(self.payload_size()).max(1)
    }

    fn layout(&mut self, bitmap: &FreeSpaceBitmap, len: usize) -> Result<Layout> {
        let required = self.blocks_required(len);
        let blocks = self
            .selector
            .select(bitmap, required)
            .ok_or(FileSystemError::InsufficientSpace { required })?;
        Ok(Layout {
            allocation: Allocation::Chained {
                start_block: blocks[0],
            },
            blocks,
        })
    }

    fn encode(&self, disk: &mut dyn BlockDevice, layout: &Layout, data: &[u8]) -> Result<()> {
        let payload = self.payload_size();
        let mut chunks = data.chunks(payload);
        // 链的顺序就是 layout 给出的分配顺序
        for (i, &block) in layout.blocks.iter().enumerate() {
            let chunk = chunks.next().unwrap_or(&[]);
            let mut buf = vec![0u8; self.block_size];
            buf[..chunk.len()].copy_from_slice(chunk);
            let next = layout.blocks.get(i + 1).copied();
            self.pointer.write(next, &mut buf[payload..]);
            disk.write_block(block, &buf)?;
        }
        Ok(())
    }

    fn decode(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<u8>> {
        let start = self.start_of(allocation)?;
        let mut data = Vec::new();
        self.follow(disk, start, |payload| data.extend_from_slice(payload))?;
        Ok(data)
    }

    fn walk(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<BlockId>> {
        let start = self.start_of(allocation)?;
        self.follow(disk, start, |_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{disk::MemDisk, fs::config::BlockSelection};

    fn strategy() -> Chained {
        Chained::new(
            128,
            PointerCodec::for_block_count(16),
            BlockSelector::new(BlockSelection::FirstFit),
            &[0, 1],
        )
    }

    #[test]
    fn pointer_byte_links_blocks_in_allocation_order() {
        let mut disk = MemDisk::new(128, 16);
        let mut bitmap = FreeSpaceBitmap::new(1, 16, &[0, 1]);
        bitmap.mark_used(&mut disk, &[3]).unwrap();
        let mut chained = strategy();
        let data = vec![0x5A; 300];

        let layout = chained.layout(&bitmap, data.len()).unwrap();
        // 127 字节 / 块 → 3 块，跳过已占用的 3 号块
        assert_eq!(layout.blocks, vec![2, 4, 5]);
        chained.encode(&mut disk, &layout, &data).unwrap();

        assert_eq!(disk.read_block(2).unwrap()[127], 4);
        assert_eq!(disk.read_block(4).unwrap()[127], 5);
        assert_eq!(disk.read_block(5).unwrap()[127], 0xFF);

        let decoded = chained.decode(&disk, &layout.allocation).unwrap();
        assert_eq!(decoded.len(), 3 * 127);
        assert_eq!(&decoded[..300], &data[..]);
        assert_eq!(chained.walk(&disk, &layout.allocation).unwrap(), vec![2, 4, 5]);
    }

    #[test]
    fn cycle_is_reported_instead_of_looping() {
        let mut disk = MemDisk::new(128, 16);
        let mut buf = vec![0u8; 128];
        buf[127] = 3;
        disk.write_block(2, &buf).unwrap();
        buf[127] = 2;
        disk.write_block(3, &buf).unwrap();

        let chained = strategy();
        let allocation = Allocation::Chained { start_block: 2 };
        assert!(matches!(
            chained.walk(&disk, &allocation),
            Err(FileSystemError::CorruptChain { start: 2 })
        ));
        assert!(matches!(
            chained.decode(&disk, &allocation),
            Err(FileSystemError::CorruptChain { .. })
        ));
    }

    #[test]
    fn pointer_past_the_disk_is_corrupt() {
        let mut disk = MemDisk::new(128, 16);
        let mut buf = vec![0u8; 128];
        buf[127] = 40;
        disk.write_block(2, &buf).unwrap();
        let allocation = Allocation::Chained { start_block: 2 };
        assert!(matches!(
            strategy().walk(&disk, &allocation),
            Err(FileSystemError::CorruptChain { start: 2 })
        ));
    }

    #[test]
    fn pointer_into_a_reserved_block_is_corrupt() {
        let mut disk = MemDisk::new(128, 16);
        let mut buf = vec![0u8; 128];
        buf[127] = 1; // 指向位图块
        disk.write_block(2, &buf).unwrap();
        let allocation = Allocation::Chained { start_block: 2 };
        assert!(matches!(
            strategy().walk(&disk, &allocation),
            Err(FileSystemError::CorruptChain { start: 2 })
        ));
        assert!(matches!(
            strategy().walk(&disk, &Allocation::Chained { start_block: 0 }),
            Err(FileSystemError::CorruptChain { start: 0 })
        ));
    }
}
