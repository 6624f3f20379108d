use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    disk::{Block, BlockDevice, BlockId, MemDisk},
    fs::{
        alloc::{build_strategy, AllocationMethod, AllocationStrategy},
        bitmap::FreeSpaceBitmap,
        config::FsConfig,
        error::{FileSystemError, Result},
        file_table::{FileEntry, FileTable},
        super_block::SuperBlock,
    },
};

pub mod alloc;
pub mod bitmap;
pub mod config;
pub mod error;
pub mod file_table;
pub mod super_block;

/// 分配引擎：把块设备、位图、文件表和分配策略组合成增删改查操作。
///
/// 单线程、不可重入：每个操作都执行完毕后才接受下一个。
/// 多调用方场景应在外层用一把互斥锁包住整个 `FileSystem`。
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice = MemDisk> {
    disk: D,                                // 底层块设备
    config: FsConfig,                       // 几何参数与校验规则
    bitmap: FreeSpaceBitmap,                // 空闲块信息（持久化在位图块中）
    table: FileTable,                       // 文件名 -> 分配元数据
    strategy: Box<dyn AllocationStrategy>,  // 构造时选定的分配方式
}

/// 磁盘使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub block_size: usize,
    pub total_blocks: usize,
    pub reserved_blocks: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
}

/// 位图与文件表的一致性检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// 位图标记为已用，但没有任何文件引用
    pub leaked: Vec<BlockId>,
    /// 被文件引用，但位图标记为空闲
    pub unmarked: Vec<BlockId>,
    /// 被多个文件同时引用
    pub shared: Vec<BlockId>,
    /// 无法遍历的文件（坏链、坏索引）
    pub unreadable: Vec<String>,
    /// 内存中的位图与位图块内容不一致
    pub bitmap_out_of_sync: bool,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl FileSystem<MemDisk> {
    /// 在一块全新的内存磁盘上格式化出文件系统
    pub fn new(config: FsConfig) -> Result<Self> {
        config.validate()?;
        let disk = MemDisk::new(config.block_size, config.block_count);
        Self::with_device(disk, config)
    }
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn with_device(disk: D, config: FsConfig) -> Result<Self> {
        config.validate()?;
        if disk.block_size() != config.block_size || disk.block_count() != config.block_count {
            return Err(FileSystemError::InvalidConfig(format!(
                "device is {} x {} bytes, config expects {} x {} bytes",
                disk.block_count(),
                disk.block_size(),
                config.block_count,
                config.block_size
            )));
        }

        let bitmap = FreeSpaceBitmap::new(
            config.bitmap_block,
            config.block_count,
            &config.reserved_blocks(),
        );
        let strategy = build_strategy(&config);
        let mut fs = Self {
            disk,
            config,
            bitmap,
            table: FileTable::new(),
            strategy,
        };
        fs.format()?;
        Ok(fs)
    }

    /// 清空磁盘、位图和文件表，重新写入超级块
    pub fn format(&mut self) -> Result<()> {
        let zero = vec![0u8; self.config.block_size];
        for block_id in 0..self.config.block_count {
            self.disk.write_block(block_id, &zero)?;
        }
        self.bitmap.clear();
        self.bitmap.sync(&mut self.disk)?;
        self.table.clear();
        // 重建策略，让随机挑选从种子重新开始
        self.strategy = build_strategy(&self.config);
        self.sync_super_block()?;
        debug!(
            method = %self.config.method,
            blocks = self.config.block_count,
            block_size = self.config.block_size,
            "formatted"
        );
        Ok(())
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn method(&self) -> AllocationMethod {
        self.strategy.method()
    }

    /// 创建文件：先校验，再 layout、encode，最后才修改位图和文件表。
    /// 前面任何一步失败都不会留下痕迹。
    pub fn create_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.config.names.validate(name)?;
        let max = self.config.max_file_size();
        if data.len() > max {
            return Err(FileSystemError::FileTooLarge {
                size: data.len(),
                max,
            });
        }
        if self.table.contains(name) {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }

        let layout = self.strategy.layout(&self.bitmap, data.len())?;
        self.strategy.encode(&mut self.disk, &layout, data)?;

        self.bitmap.mark_used(&mut self.disk, &layout.blocks)?;
        self.table
            .insert(FileEntry::new(name, data.len(), layout.allocation))?;
        self.sync_super_block()?;

        debug!(file = name, bytes = data.len(), blocks = ?layout.blocks, "created");
        Ok(())
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        let mut data = self.strategy.decode(&self.disk, &entry.allocation)?;
        if self.config.trim_padding {
            if data.len() < entry.size {
                return Err(FileSystemError::Corrupted(format!(
                    "{} records {} bytes but only {} are reachable",
                    name,
                    entry.size,
                    data.len()
                )));
            }
            data.truncate(entry.size);
        }
        Ok(data)
    }

    /// 整体替换：先删除再创建。
    ///
    /// 这不是原子操作：如果重新创建失败（例如空间不足），
    /// 旧文件已经被删除，不会回滚。
    pub fn update_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if !self.table.contains(name) {
            return Err(FileSystemError::FileNotFound(name.to_string()));
        }
        self.delete_file(name)?;
        self.create_file(name, data)
    }

    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;
        // 遍历失败（坏链）时位图和文件表都保持不变
        let blocks = self.strategy.walk(&self.disk, &entry.allocation)?;

        self.bitmap.mark_free(&mut self.disk, &blocks)?;
        self.table.remove(name);
        self.sync_super_block()?;

        debug!(file = name, blocks = ?blocks, "deleted");
        Ok(())
    }

    /// 原始块内容，用于诊断
    pub fn read_block(&self, index: BlockId) -> Result<Block> {
        Ok(self.disk.read_block(index)?.to_vec())
    }

    /// 位图块的原始内容
    pub fn bitmap(&self) -> Vec<u8> {
        let mut block = vec![0u8; self.config.block_size];
        let bits = self.bitmap.as_bytes();
        block[..bits.len()].copy_from_slice(bits);
        block
    }

    pub fn is_block_used(&self, index: BlockId) -> bool {
        self.bitmap.is_used(index)
    }

    pub fn list_files(&self) -> impl Iterator<Item = &FileEntry> {
        self.table.iter()
    }

    pub fn file_count(&self) -> usize {
        self.table.len()
    }

    pub fn stat(&self, name: &str) -> Result<&FileEntry> {
        self.entry(name)
    }

    /// 文件占用的全部块，按文件内顺序（索引分配时索引块在最前）
    pub fn blocks_of(&self, name: &str) -> Result<Vec<BlockId>> {
        let entry = self.entry(name)?;
        self.strategy.walk(&self.disk, &entry.allocation)
    }

    pub fn usage(&self) -> DiskUsage {
        let total_blocks = self.config.block_count;
        let reserved_blocks = self.config.reserved_blocks().len();
        let free_blocks = self.bitmap.free_count();
        DiskUsage {
            block_size: self.config.block_size,
            total_blocks,
            reserved_blocks,
            used_blocks: total_blocks - reserved_blocks - free_blocks,
            free_blocks,
        }
    }

    pub fn super_block(&self) -> Result<SuperBlock> {
        SuperBlock::load(&self.disk, self.config.allocation_table_block)
    }

    /// 重新从位图块读取位图，和所有文件遍历得到的块集合逐块比较
    pub fn check(&self) -> Result<ConsistencyReport> {
        let mut owners: BTreeMap<BlockId, usize> = BTreeMap::new();
        let mut report = ConsistencyReport::default();

        for entry in self.table.iter() {
            match self.strategy.walk(&self.disk, &entry.allocation) {
                Ok(blocks) => {
                    for block in blocks {
                        *owners.entry(block).or_default() += 1;
                    }
                }
                Err(_) => report.unreadable.push(entry.name.clone()),
            }
        }

        let on_disk = FreeSpaceBitmap::load(
            &self.disk,
            self.config.bitmap_block,
            self.config.block_count,
            &self.config.reserved_blocks(),
        )?;
        let used: BTreeSet<BlockId> = on_disk.used_blocks().into_iter().collect();

        report.leaked = used
            .iter()
            .filter(|b| !owners.contains_key(*b))
            .copied()
            .collect();
        report.unmarked = owners
            .keys()
            .filter(|b| !used.contains(*b))
            .copied()
            .collect();
        report.shared = owners
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(&block, _)| block)
            .collect();
        report.bitmap_out_of_sync = on_disk.as_bytes() != self.bitmap.as_bytes();
        Ok(report)
    }

    fn entry(&self, name: &str) -> Result<&FileEntry> {
        self.table
            .get(name)
            .ok_or_else(|| FileSystemError::FileNotFound(name.to_string()))
    }

    fn sync_super_block(&mut self) -> Result<()> {
        let mut super_block = SuperBlock::new(&self.config);
        super_block.file_count = self.table.len() as u64;
        super_block.used_blocks = self.bitmap.used_blocks().len() as u64;
        super_block.sync(&mut self.disk, self.config.allocation_table_block)
    }
}
