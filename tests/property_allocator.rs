//! Property-based tests for allocator invariants
//!
//! Random create/update/delete sequences must keep the bitmap equal to the
//! union of every live file's blocks, with no block owned twice.

use std::collections::{BTreeSet, HashMap};

use alloc_fs::{AllocationMethod, FileSystem, FileSystemError, FsConfig};
use proptest::prelude::*;

const NAMES: [&str; 6] = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];
const BLOCK_SIZE: usize = 128;
const BLOCK_COUNT: usize = 40;
const MAX_BLOCKS: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Create(usize, usize, u8),
    Update(usize, usize, u8),
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    let name = 0..NAMES.len();
    let size = 0..=BLOCK_SIZE * MAX_BLOCKS;
    prop_oneof![
        (name.clone(), size.clone(), any::<u8>()).prop_map(|(n, s, b)| Op::Create(n, s, b)),
        (name.clone(), size, any::<u8>()).prop_map(|(n, s, b)| Op::Update(n, s, b)),
        name.prop_map(Op::Delete),
    ]
}

fn payload(size: usize, salt: u8) -> Vec<u8> {
    (0..size).map(|i| (i as u8).wrapping_add(salt)).collect()
}

fn used_bits(fs: &FileSystem) -> BTreeSet<usize> {
    let raw = fs.bitmap();
    (0..BLOCK_COUNT)
        .filter(|&b| raw[b / 8] >> (b % 8) & 1 == 1)
        .collect()
}

fn assert_invariants(
    fs: &FileSystem,
    model: &HashMap<&str, Vec<u8>>,
) -> Result<(), TestCaseError> {
    let mut owned = BTreeSet::new();
    for entry in fs.list_files() {
        for block in fs.blocks_of(&entry.name).unwrap() {
            prop_assert!(block >= 2, "reserved block {} handed to {}", block, entry.name);
            prop_assert!(owned.insert(block), "block {} allocated twice", block);
        }
    }
    prop_assert_eq!(&owned, &used_bits(fs));
    prop_assert!(fs.check().unwrap().is_clean());

    prop_assert_eq!(fs.file_count(), model.len());
    for (name, data) in model {
        prop_assert_eq!(&fs.read_file(name).unwrap(), data);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_bitmap_matches_live_files(
        method in prop::sample::select(AllocationMethod::ALL.to_vec()),
        random in any::<Option<u64>>(),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let mut config = FsConfig {
            block_size: BLOCK_SIZE,
            block_count: BLOCK_COUNT,
            max_blocks_per_file: MAX_BLOCKS,
            method,
            ..FsConfig::default()
        };
        if let Some(seed) = random {
            config.selection = alloc_fs::fs::config::BlockSelection::Random { seed };
        }
        let mut fs = FileSystem::new(config).unwrap();
        let mut model: HashMap<&str, Vec<u8>> = HashMap::new();

        for op in ops {
            match op {
                Op::Create(n, size, salt) => {
                    let data = payload(size, salt);
                    match fs.create_file(NAMES[n], &data) {
                        Ok(()) => {
                            prop_assert!(!model.contains_key(NAMES[n]));
                            model.insert(NAMES[n], data);
                        }
                        Err(FileSystemError::AlreadyExists(_)) => {
                            prop_assert!(model.contains_key(NAMES[n]));
                        }
                        Err(FileSystemError::InsufficientSpace { .. }) => {
                            prop_assert!(fs.stat(NAMES[n]).is_err());
                        }
                        Err(e) => prop_assert!(false, "unexpected error {}", e),
                    }
                }
                Op::Update(n, size, salt) => {
                    let data = payload(size, salt);
                    match fs.update_file(NAMES[n], &data) {
                        Ok(()) => {
                            model.insert(NAMES[n], data);
                        }
                        Err(FileSystemError::FileNotFound(_)) => {
                            prop_assert!(!model.contains_key(NAMES[n]));
                        }
                        Err(FileSystemError::InsufficientSpace { .. }) => {
                            // 先删后建：失败后文件已不存在
                            model.remove(NAMES[n]);
                            prop_assert!(fs.stat(NAMES[n]).is_err());
                        }
                        Err(e) => prop_assert!(false, "unexpected error {}", e),
                    }
                }
                Op::Delete(n) => {
                    let had = model.remove(NAMES[n]).is_some();
                    match fs.delete_file(NAMES[n]) {
                        Ok(()) => prop_assert!(had),
                        Err(FileSystemError::FileNotFound(_)) => prop_assert!(!had),
                        Err(e) => prop_assert!(false, "unexpected error {}", e),
                    }
                }
            }
            assert_invariants(&fs, &model)?;
        }
    }

    #[test]
    fn prop_delete_returns_every_block(
        method in prop::sample::select(AllocationMethod::ALL.to_vec()),
        sizes in prop::collection::vec(0..=BLOCK_SIZE * MAX_BLOCKS, 1..6),
    ) {
        let mut fs = FileSystem::new(FsConfig {
            block_size: BLOCK_SIZE,
            block_count: BLOCK_COUNT,
            max_blocks_per_file: MAX_BLOCKS,
            method,
            ..FsConfig::default()
        })
        .unwrap();
        let free_before = fs.usage().free_blocks;

        let mut created = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            if fs.create_file(NAMES[i], &payload(*size, i as u8)).is_ok() {
                created.push(NAMES[i]);
            }
        }
        for name in created {
            fs.delete_file(name).unwrap();
        }
        prop_assert_eq!(fs.usage().free_blocks, free_before);
        prop_assert!(used_bits(&fs).is_empty());
    }
}
