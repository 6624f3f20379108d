use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockId, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE},
    fs::{
        alloc::{pointer::PointerCodec, AllocationMethod},
        error::{FileSystemError, Result},
    },
};

pub const ALLOCATION_TABLE_BLOCK_ID: BlockId = 0;
pub const BITMAP_BLOCK_ID: BlockId = 1;

// 参考策略：单个文件最多 10 个块
pub const DEFAULT_MAX_BLOCKS_PER_FILE: usize = 10;
pub const DEFAULT_MAX_NAME_LEN: usize = 8;

// 超级块需要放进一个块里
pub const MIN_BLOCK_SIZE: usize = 128;
pub const MAX_BLOCK_COUNT: usize = u16::MAX as usize;

bitflags! {
    /// 文件名允许出现的字符类别
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CharClass: u8 {
        const LOWER = 0b0001; // a-z
        const UPPER = 0b0010; // A-Z
        const DIGIT = 0b0100; // 0-9
        const PUNCT = 0b1000; // . _ -
    }
}

impl CharClass {
    pub fn allows(&self, c: char) -> bool {
        (self.contains(Self::LOWER) && c.is_ascii_lowercase())
            || (self.contains(Self::UPPER) && c.is_ascii_uppercase())
            || (self.contains(Self::DIGIT) && c.is_ascii_digit())
            || (self.contains(Self::PUNCT) && matches!(c, '.' | '_' | '-'))
    }
}

/// 文件名校验规则，严格或宽松由配置决定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamePolicy {
    pub max_len: usize,
    pub charset: CharClass,
}

impl NamePolicy {
    /// 参考策略：1~8 个小写字母
    pub fn strict() -> Self {
        Self {
            max_len: DEFAULT_MAX_NAME_LEN,
            charset: CharClass::LOWER,
        }
    }

    pub fn permissive() -> Self {
        Self {
            max_len: 255,
            charset: CharClass::all(),
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let len = name.chars().count();
        if len == 0 || len > self.max_len || !name.chars().all(|c| self.charset.allows(c)) {
            return Err(FileSystemError::InvalidName(name.to_string()));
        }
        Ok(())
    }
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self::strict()
    }
}

/// 链式 / 索引分配时空闲块的挑选方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum BlockSelection {
    /// 从低块号向上线性扫描
    #[default]
    FirstFit,
    /// 用固定种子随机挑选，可复现
    Random { seed: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub block_size: usize,
    pub block_count: usize,
    pub allocation_table_block: BlockId,
    pub bitmap_block: BlockId,
    pub max_blocks_per_file: usize,
    pub method: AllocationMethod,
    pub selection: BlockSelection,
    /// 读取时按记录的原始长度截掉块尾填充
    pub trim_padding: bool,
    pub names: NamePolicy,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            allocation_table_block: ALLOCATION_TABLE_BLOCK_ID,
            bitmap_block: BITMAP_BLOCK_ID,
            max_blocks_per_file: DEFAULT_MAX_BLOCKS_PER_FILE,
            method: AllocationMethod::default(),
            selection: BlockSelection::default(),
            trim_padding: true,
            names: NamePolicy::default(),
        }
    }
}

impl FsConfig {
    pub fn with_method(method: AllocationMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: FsConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 单个文件允许的最大字节数
    pub fn max_file_size(&self) -> usize {
        self.max_blocks_per_file * self.block_size
    }

    pub fn reserved_blocks(&self) -> [BlockId; 2] {
        [self.allocation_table_block, self.bitmap_block]
    }

    pub fn pointer_codec(&self) -> PointerCodec {
        PointerCodec::for_block_count(self.block_count)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FileSystemError::InvalidConfig(msg));

        if self.block_count < 3 || self.block_count > MAX_BLOCK_COUNT {
            return invalid(format!(
                "block_count must be within 3..={}, got {}",
                MAX_BLOCK_COUNT, self.block_count
            ));
        }
        if self.block_size < MIN_BLOCK_SIZE {
            return invalid(format!(
                "block_size must be at least {}, got {}",
                MIN_BLOCK_SIZE, self.block_size
            ));
        }
        for reserved in self.reserved_blocks() {
            if reserved >= self.block_count {
                return invalid(format!("reserved block {} is out of range", reserved));
            }
        }
        if self.allocation_table_block == self.bitmap_block {
            return invalid("allocation table and bitmap share a block".to_string());
        }
        if self.block_count.div_ceil(8) > self.block_size {
            return invalid(format!(
                "bitmap for {} blocks does not fit in a {}-byte block",
                self.block_count, self.block_size
            ));
        }
        if self.max_blocks_per_file == 0 {
            return invalid("max_blocks_per_file must be positive".to_string());
        }
        let index_capacity = self.pointer_codec().entries_per_block(self.block_size);
        if index_capacity < self.max_blocks_per_file {
            return invalid(format!(
                "an index block holds {} entries, fewer than max_blocks_per_file = {}",
                index_capacity, self.max_blocks_per_file
            ));
        }
        if self.names.max_len == 0 || self.names.charset.is_empty() {
            return invalid("name policy admits no names".to_string());
        }
        Ok(())
    }
}
