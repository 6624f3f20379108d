use std::{fmt, str::FromStr};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockDevice, BlockId},
    fs::{
        bitmap::FreeSpaceBitmap,
        config::{BlockSelection, FsConfig},
        error::{FileSystemError, Result},
    },
};

pub mod chained;
pub mod contiguous;
pub mod indexed;
pub mod pointer;

pub use chained::Chained;
pub use contiguous::Contiguous;
pub use indexed::Indexed;

/// 三种互斥的块分配方式，构造文件系统时选定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMethod {
    #[default]
    Contiguous,
    Chained,
    Indexed,
}

impl AllocationMethod {
    pub const ALL: [AllocationMethod; 3] = [Self::Contiguous, Self::Chained, Self::Indexed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contiguous => "contiguous",
            Self::Chained => "chained",
            Self::Indexed => "indexed",
        }
    }
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationMethod {
    type Err = FileSystemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contiguous" => Ok(Self::Contiguous),
            "chained" | "linked" => Ok(Self::Chained),
            "indexed" => Ok(Self::Indexed),
            other => Err(FileSystemError::InvalidConfig(format!(
                "unknown allocation method: {}",
                other
            ))),
        }
    }
}

/// 文件表中按策略区分的分配元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Allocation {
    Contiguous {
        start_block: BlockId,
        block_count: usize,
    },
    /// 长度隐含在链中，末块指针为结束标记
    Chained { start_block: BlockId },
    /// 索引块按分配顺序列出数据块，空槽为结束标记
    Indexed { index_block: BlockId },
}

impl Allocation {
    pub fn method(&self) -> AllocationMethod {
        match self {
            Self::Contiguous { .. } => AllocationMethod::Contiguous,
            Self::Chained { .. } => AllocationMethod::Chained,
            Self::Indexed { .. } => AllocationMethod::Indexed,
        }
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contiguous {
                start_block,
                block_count,
            } => write!(f, "start={} length={}", start_block, block_count),
            Self::Chained { start_block } => write!(f, "start={}", start_block),
            Self::Indexed { index_block } => write!(f, "index={}", index_block),
        }
    }
}

/// 一次分配的结果：元数据 + 按写入顺序排列的全部块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub allocation: Allocation,
    pub blocks: Vec<BlockId>,
}

/// 分配策略的统一能力集合 {layout, encode, decode, walk}
pub trait AllocationStrategy: Send + fmt::Debug {
    fn method(&self) -> AllocationMethod;

    /// 存放 len 字节需要的块数（包括索引块等元数据块）
    fn blocks_required(&self, len: usize) -> usize;

    /// 只向位图询问空闲块，不修改任何状态
    fn layout(&mut self, bitmap: &FreeSpaceBitmap, len: usize) -> Result<Layout>;

    fn encode(&self, disk: &mut dyn BlockDevice, layout: &Layout, data: &[u8]) -> Result<()>;

    /// 返回按块对齐的内容，包含末块填充
    fn decode(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<u8>>;

    /// 文件占用的全部块，按文件内顺序
    fn walk(&self, disk: &dyn BlockDevice, allocation: &Allocation) -> Result<Vec<BlockId>>;
}

pub fn build_strategy(config: &FsConfig) -> Box<dyn AllocationStrategy> {
    let pointer = config.pointer_codec();
    let selector = BlockSelector::new(config.selection);
    let reserved = config.reserved_blocks();
    match config.method {
        AllocationMethod::Contiguous => Box::new(Contiguous::new(config.block_size)),
        AllocationMethod::Chained => Box::new(Chained::new(
            config.block_size,
            pointer,
            selector,
            &reserved,
        )),
        AllocationMethod::Indexed => Box::new(Indexed::new(
            config.block_size,
            pointer,
            selector,
            &reserved,
        )),
    }
}

/// 链式 / 索引分配挑选空闲块的方式
#[derive(Debug)]
pub struct BlockSelector {
    rng: Option<StdRng>, // None 表示首次适配
}

impl BlockSelector {
    pub fn new(selection: BlockSelection) -> Self {
        let rng = match selection {
            BlockSelection::FirstFit => None,
            BlockSelection::Random { seed } => Some(StdRng::seed_from_u64(seed)),
        };
        Self { rng }
    }

    pub fn select(&mut self, bitmap: &FreeSpaceBitmap, count: usize) -> Option<Vec<BlockId>> {
        match self.rng.as_mut() {
            None => bitmap.find_any(count),
            Some(rng) => {
                let mut candidates = bitmap.free_list();
                if candidates.len() < count {
                    return None;
                }
                let (chosen, _) = candidates.partial_shuffle(rng, count);
                Some(chosen.to_vec())
            }
        }
    }
}

/// 末块不足一块时补 0
pub(crate) fn padded_block(block_size: usize, chunk: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; block_size];
    buf[..chunk.len()].copy_from_slice(chunk);
    buf
}

pub(crate) fn mismatch(expected: AllocationMethod, found: &Allocation) -> FileSystemError {
    FileSystemError::Corrupted(format!(
        "{} metadata handed to the {} strategy",
        found.method(),
        expected
    ))
}
