/// 参考模型中每个逻辑块（Block）的大小：512 字节
/// 文件系统以“块”为最小读写单位。
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// 参考模型中磁盘包含的块总数
pub const DEFAULT_BLOCK_COUNT: usize = 256;

/// 块编号，取值范围 [0, block_count)
pub type BlockId = usize;

/// 一个逻辑块的字节内容，长度恒等于 block_size
pub type Block = Vec<u8>;
