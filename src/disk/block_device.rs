use crate::disk::{error::Result, types::BlockId};

/// 块设备抽象：只负责按块号读写定长块，不关心任何分配策略。
pub trait BlockDevice: Send + Sync {
    fn block_size(&self) -> usize;
    fn block_count(&self) -> usize;
    fn read_block(&self, block_id: BlockId) -> Result<&[u8]>;
    fn write_block(&mut self, block_id: BlockId, buf: &[u8]) -> Result<()>;
}
