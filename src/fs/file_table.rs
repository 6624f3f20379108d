use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use crate::{
    fs::{
        alloc::Allocation,
        error::{FileSystemError, Result},
    },
    utils::current_timestamp,
};

// 文件表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: usize,                // 原始字节长度，读取时据此去掉块尾填充
    pub allocation: Allocation,     // 按策略区分的分配元数据
    pub created_at: DateTime<Local>,
}

impl FileEntry {
    pub fn new(name: &str, size: usize, allocation: Allocation) -> Self {
        Self {
            name: name.to_string(),
            size,
            allocation,
            created_at: current_timestamp(),
        }
    }
}

/// 文件表（目录）：文件名 -> 分配元数据，只由 FileSystem 持有和修改
#[derive(Debug, Clone, Default)]
pub struct FileTable {
    entries: BTreeMap<String, FileEntry>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: FileEntry) -> Result<()> {
        if self.entries.contains_key(&entry.name) {
            return Err(FileSystemError::AlreadyExists(entry.name));
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    // 删除表项，返回被删除的项
    pub fn remove(&mut self, name: &str) -> Option<FileEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FileEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 按文件名排序
    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }
}
