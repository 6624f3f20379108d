use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    error::Error,
    path::{Path, PathBuf},
};

use crate::{
    fs::{error::Result as FsResult, FileSystem},
    utils::{hex_dump, human_size},
};

// 每行显示的位图块数
const BITMAP_ROW: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ls,
    Cat(String),
    Create(String, String),
    Write(String, String),
    Rm(String),
    Stat(String),
    Bitmap,
    Block(usize),
    Import(PathBuf, String),
    Export(String, PathBuf),
    Info,
    Fsck,
    Format,
    Exit,
}

pub fn execute_command(cmd: &Command, fs: &mut FileSystem) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls => list_files(fs),
        Command::Cat(name) => {
            let data = fs.read_file(name)?;
            println!("📖 {} ({})", name.cyan(), human_size(data.len()));
            println!("{}", String::from_utf8_lossy(&data));
        }
        Command::Create(name, content) => {
            fs.create_file(name, content.as_bytes())?;
            println!("📝 Created file: {}", name.green());
        }
        Command::Write(name, content) => {
            fs.update_file(name, content.as_bytes())?;
            println!("✏️  Updated file: {}", name.green());
        }
        Command::Rm(name) => {
            fs.delete_file(name)?;
            println!("❌ Deleted file: {}", name.red());
        }
        Command::Stat(name) => {
            let entry = fs.stat(name)?;
            let blocks = fs.blocks_of(name)?;
            println!(
                "{}\n{}: {}\n{}: {} bytes\n{}: {} {}\n{}: {:?}\n{}: {}\n",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                entry.name,
                "Size".blue(),
                entry.size,
                "Layout".blue(),
                fs.method(),
                entry.allocation,
                "Blocks".blue(),
                blocks,
                "Created".blue(),
                entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            );
        }
        Command::Bitmap => print_bitmap(fs),
        Command::Block(index) => {
            let block = fs.read_block(*index)?;
            println!("{}", format!("🧱 Block {}", index).bright_yellow().bold());
            for line in hex_dump(&block) {
                println!("{}", line.bright_black());
            }
        }
        Command::Import(host, name) => {
            let bytes = import_host_file(fs, host, name)?;
            println!(
                "📥 Copied {} into {} ({})",
                host.display(),
                name.green(),
                human_size(bytes)
            );
        }
        Command::Export(name, host) => {
            let bytes = export_to_host(fs, name, host)?;
            println!(
                "📤 Copied {} to {} ({})",
                name.cyan(),
                host.display(),
                human_size(bytes)
            );
        }
        Command::Info => print_info(fs)?,
        Command::Fsck => {
            let report = fs.check()?;
            if report.is_clean() {
                println!("{}", "✅ Bitmap and file table agree".green());
            } else {
                println!("{}", "⚠️  Inconsistencies found".yellow().bold());
                println!("  leaked:     {:?}", report.leaked);
                println!("  unmarked:   {:?}", report.unmarked);
                println!("  shared:     {:?}", report.shared);
                println!("  unreadable: {:?}", report.unreadable);
                println!("  bitmap block out of sync: {}", report.bitmap_out_of_sync);
            }
        }
        Command::Format => {
            println!("💾 Formatting virtual disk...");
            let pb = ProgressBar::new(fs.config().block_count as u64);
            let template = "[{bar:40.green/black}] {pos:>3} blocks {msg}";
            if let Ok(style) = ProgressStyle::with_template(template) {
                pb.set_style(style.progress_chars("#>-"));
            }
            fs.format()?;
            pb.set_position(fs.config().block_count as u64);
            pb.finish_with_message("✅ Disk formatted successfully!");
        }
        Command::Exit => println!("{}", "👋 Exiting AllocFS shell...".yellow().bold()),
    }

    Ok(())
}

/// 把宿主机上的文件复制进模拟磁盘，只经过 create_file
pub fn import_host_file(
    fs: &mut FileSystem,
    host: &Path,
    name: &str,
) -> Result<usize, Box<dyn Error>> {
    let data = std::fs::read(host)?;
    fs.create_file(name, &data)?;
    Ok(data.len())
}

/// 把模拟磁盘中的文件写到宿主机，只经过 read_file
pub fn export_to_host(fs: &FileSystem, name: &str, host: &Path) -> Result<usize, Box<dyn Error>> {
    let data = fs.read_file(name)?;
    std::fs::write(host, &data)?;
    Ok(data.len())
}

fn list_files(fs: &FileSystem) {
    if fs.file_count() == 0 {
        println!("{}", "(no files)".bright_black());
        return;
    }
    println!(
        "{}",
        format!("{:<10} {:>8}  {}", "NAME", "SIZE", "ALLOCATION").bold()
    );
    for entry in fs.list_files() {
        println!(
            "📄 {:<8} {:>8}  {}",
            entry.name.cyan(),
            human_size(entry.size),
            entry.allocation
        );
    }
}

fn print_bitmap(fs: &FileSystem) {
    let usage = fs.usage();
    let reserved = fs.config().reserved_blocks();
    println!(
        "{} {} used / {} free",
        "🗺️  Free space bitmap:".bright_yellow().bold(),
        usage.used_blocks.to_string().red(),
        usage.free_blocks.to_string().green()
    );
    for row_start in (0..usage.total_blocks).step_by(BITMAP_ROW) {
        let row_end = (row_start + BITMAP_ROW).min(usage.total_blocks);
        let cells: String = (row_start..row_end)
            .map(|block| {
                if reserved.contains(&block) {
                    "R".yellow().to_string()
                } else if fs.is_block_used(block) {
                    "■".red().to_string()
                } else {
                    "·".green().to_string()
                }
            })
            .collect();
        println!("{:>4}  {}", row_start, cells);
    }
}

fn print_info(fs: &FileSystem) -> FsResult<()> {
    let sb = fs.super_block()?;
    let usage = fs.usage();
    println!("{}", "💽 Disk Info".bright_yellow().bold());
    println!("  {}: {} (magic {:#x})", "Type".blue(), sb.fs_type, sb.magic);
    println!("  {}: {}", "Method".blue(), sb.method);
    println!(
        "  {}: {} blocks x {} bytes",
        "Geometry".blue(),
        sb.total_blocks,
        sb.block_size
    );
    println!(
        "  {}: {} (max {} blocks)",
        "Files".blue(),
        sb.file_count,
        sb.max_blocks_per_file
    );
    println!(
        "  {}: {} used, {} free, {} reserved",
        "Blocks".blue(),
        usage.used_blocks,
        usage.free_blocks,
        usage.reserved_blocks
    );
    Ok(())
}

fn print_help() {
    println!("{}", "📘 AllocFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls                    Show the file table
  cat <file>            Display a file
  create <file> <text>  Create a file with the given content
  write <file> <text>   Replace a file's content
  rm <file>             Delete a file
  stat <file>           Show file metadata and blocks
  bitmap                Show the free space bitmap
  block <n>             Dump a raw disk block
  import <path> <file>  Copy a host file into the simulation
  export <file> <path>  Copy a simulated file to the host
  info                  Show super block and usage
  fsck                  Check bitmap against the file table
  format                Wipe the virtual disk
  help                  Show this help message
  exit                  Quit the shell
"
        .bright_black()
    );
}
