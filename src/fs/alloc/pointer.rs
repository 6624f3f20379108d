use crate::disk::BlockId;

/// 块指针的磁盘编码：小端定宽整数，全 1 表示结束标记（即 -1 转无符号）。
///
/// 宽度取能让所有合法块号都小于全 1 的最小字节数。
/// 块数不超过 255 时为 1 字节；256 块的参考磁盘需要 2 字节，
/// 否则 255 号块会与 0xFF 结束标记冲突。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerCodec {
    width: usize,
}

impl PointerCodec {
    pub fn for_block_count(block_count: usize) -> Self {
        let mut width = 1;
        while block_count >= 1usize << (8 * width) {
            width += 1;
        }
        Self { width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn sentinel(&self) -> usize {
        (1usize << (8 * self.width)) - 1
    }

    /// 一个块能容纳的指针个数
    pub fn entries_per_block(&self, block_size: usize) -> usize {
        block_size / self.width
    }

    /// None 编码为结束标记
    pub fn write(&self, ptr: Option<BlockId>, out: &mut [u8]) {
        let value = ptr.unwrap_or_else(|| self.sentinel());
        let bytes = value.to_le_bytes();
        out[..self.width].copy_from_slice(&bytes[..self.width]);
    }

    pub fn read(&self, buf: &[u8]) -> Option<BlockId> {
        let value = buf[..self.width]
            .iter()
            .rev()
            .fold(0usize, |acc, &b| (acc << 8) | b as usize);
        (value != self.sentinel()).then_some(value)
    }
}
