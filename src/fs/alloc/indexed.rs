use crate::{
    disk::{BlockDevice, BlockId},
    fs::{
        alloc::{
            mismatch, padded_block, pointer::PointerCodec, Allocation, AllocationMethod,
            AllocationStrategy, BlockSelector, Layout,
        },
        bitmap::FreeSpaceBitmap,
        error::{FileSystemError, Result},
    },
};

/// 索引分配：多占一个索引块，换来对任意数据块的 O(1) 访问
#[derive(Debug)]
pub struct Indexed {
    block_size: usize,
    pointer: PointerCodec,
    selector: BlockSelector,
    reserved: Vec<BlockId>, // 不能作为数据块出现在索引中
}

impl Indexed {
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

    fn is_data_block(&self, disk: &dyn BlockDevice, index_block: BlockId, block: BlockId) -> bool {
        block < disk.block_count() && block != index_block && !self.reserved.contains(&block)
    }

    fn index_of(&self, allocation: &Allocation) -> Result<BlockId> {
        match *allocation {
            Allocation::Indexed { index_block } => Ok(index_block),
            ref other => Err(mismatch(AllocationMethod::Indexed, other)),
        }
    }

    /// 读取索引块，直到第一个结束标记
    pub fn entries(&self, disk: &dyn BlockDevice, index_block: BlockId) -> Result<Vec<BlockId>> {
        if self.reserved.contains(&index_block) {
            return Err(FileSystemError::CorruptIndex {
                index_block,
                entry: 0,
            });
        }
        let buf = disk.read_block(index_block)?;
        let width = self.pointer.width();
        let mut entries = Vec::new();
        for (slot, raw) in buf.chunks_exact(width).enumerate() {
            match self.pointer.read(raw) {
                None => break,
                Some(block) if !self.is_data_block(disk, index_block, block) => {
                    return Err(FileSystemError::CorruptIndex {
                        index_block,
                        entry: slot,
                    });
                }
                Some(block) => entries.push(block),
            }
        }
        Ok(entries)
    }
}

impl AllocationStrategy for Indexed {
    fn method(&self) -> AllocationMethod {
        AllocationMethod::Indexed
    }

    fn blocks_required(&self, len: usize) -> usize {
        len.div_ceil(self.block_size).max(1) + 1
    }

    fn layout(&mut self, bitmap: &FreeSpaceBitmap, len: usize) -> Result<Layout> {
        let required = self.blocks_required(len);
        // 第一个选中的块作索引块，其余按顺序作数据块
        let blocks = self
            .selector
            .select(bitmap, required)
            .ok_or(FileSystemError::InsufficientSpace { required })?;
        Ok(Layout {
            allocation: Allocation::Indexed {
                index_block: blocks[0],
            },
            blocks,
        })
    }

    fn encode(&self, disk: &mut dyn BlockDevice, layout: &Layout, data: &[u8]) -> Result<()> {
        let (index_block, data_blocks) = match layout.blocks.split_first() {
            Some((&index_block, rest)) => (index_block, rest),
            None => return Err(FileSystemError::Corrupted("empty indexed layout".to_string())),
        };

        let width = self.pointer.width();
        let mut index_buf = vec![0u8; self.block_size];
        for (slot, raw) in index_buf.chunks_exact_mut(width).enumerate() {
            self.pointer.write(data_blocks.get(slot).copied(), raw);
        }
        disk.write_block(index_block, &index_buf)?;

        // 数据块不含任何指针开销
        let mut chunks = data.chunks(self.block_size);
        for &block in data_blocks {
            let chunk = chunks.next().unwrap_or(&[]);
            disk.write_block(block, &padded_block(self.block_size, chunk))?;
        }
        Ok(())
    }

    fn decode(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<u8>> {
        let index_block = self.index_of(allocation)?;
        let entries = self.entries(disk, index_block)?;
        let mut data = Vec::with_capacity(entries.len() * self.block_size);
        for block in entries {
            data.extend_from_slice(disk.read_block(block)?);
        }
        Ok(data)
    }

    fn walk(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<BlockId>> {
        let index_block = self.index_of(allocation)?;
        let mut blocks = vec![index_block];
        blocks.extend(self.entries(disk, index_block)?);
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{disk::MemDisk, fs::config::BlockSelection};

    fn strategy(block_count: usize) -> Indexed {
        Indexed::new(
            128,
            PointerCodec::for_block_count(block_count),
            BlockSelector::new(BlockSelection::FirstFit),
            &[0, 1],
        )
    }

    #[test]
    fn index_block_lists_data_blocks_then_sentinels() {
        let mut disk = MemDisk::new(128, 16);
        let bitmap = FreeSpaceBitmap::new(1, 16, &[0, 1]);
        let mut indexed = strategy(16);
        let data = vec![7u8; 129];

        let layout = indexed.layout(&bitmap, data.len()).unwrap();
        assert_eq!(layout.allocation, Allocation::Indexed { index_block: 2 });
        assert_eq!(layout.blocks, vec![2, 3, 4]);
        indexed.encode(&mut disk, &layout, &data).unwrap();

        let index = disk.read_block(2).unwrap();
        assert_eq!(&index[..2], &[3, 4]);
        assert!(index[2..].iter().all(|&b| b == 0xFF));

        let decoded = indexed.decode(&disk, &layout.allocation).unwrap();
        assert_eq!(decoded.len(), 256);
        assert_eq!(&decoded[..129], &data[..]);
        assert_eq!(indexed.walk(&disk, &layout.allocation).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn wide_pointers_reach_block_255() {
        let mut disk = MemDisk::new(128, 256);
        let mut bitmap = FreeSpaceBitmap::new(1, 256, &[0, 1]);
        let taken: Vec<BlockId> = (2..254).collect();
        bitmap.mark_used(&mut disk, &taken).unwrap();

        let mut indexed = strategy(256);
        let layout = indexed.layout(&bitmap, 10).unwrap();
        assert_eq!(layout.blocks, vec![254, 255]);
        indexed.encode(&mut disk, &layout, b"last block").unwrap();

        let decoded = indexed.decode(&disk, &layout.allocation).unwrap();
        assert_eq!(&decoded[..10], b"last block");
        assert_eq!(indexed.walk(&disk, &layout.allocation).unwrap(), vec![254, 255]);
    }

    #[test]
    fn needs_one_block_more_than_the_data() {
        let mut bitmap = FreeSpaceBitmap::new(1, 4, &[0, 1]);
        let mut disk = MemDisk::new(128, 4);
        let mut indexed = strategy(4);
        assert!(indexed.layout(&bitmap, 128).is_ok());
        bitmap.mark_used(&mut disk, &[3]).unwrap();
        assert!(matches!(
            indexed.layout(&bitmap, 128),
            Err(FileSystemError::InsufficientSpace { required: 2 })
        ));
    }

    #[test]
    fn out_of_range_entry_is_corrupt() {
        let mut disk = MemDisk::new(128, 16);
        let mut buf = vec![0xFFu8; 128];
        buf[0] = 3;
        buf[1] = 99;
        disk.write_block(2, &buf).unwrap();
        let allocation = Allocation::Indexed { index_block: 2 };
        assert!(matches!(
            strategy(16).decode(&disk, &allocation),
            Err(FileSystemError::CorruptIndex {
                index_block: 2,
                entry: 1
            })
        ));
    }

    #[test]
    fn reserved_entry_is_corrupt() {
        let mut disk = MemDisk::new(128, 16);
        let mut buf = vec![0xFFu8; 128];
        buf[0] = 0; // 指向分配表块
        disk.write_block(2, &buf).unwrap();
        let allocation = Allocation::Indexed { index_block: 2 };
        let indexed = strategy(16);
        assert!(matches!(
            indexed.walk(&disk, &allocation),
            Err(FileSystemError::CorruptIndex {
                index_block: 2,
                entry: 0
            })
        ));
        assert!(matches!(
            indexed.decode(&disk, &allocation),
            Err(FileSystemError::CorruptIndex { .. })
        ));
    }
}
