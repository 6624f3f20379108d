pub mod args;
pub mod command;
pub mod parse;

use crate::{
    fs::FileSystem,
    shell::{args::Cli, command::execute_command, parse::parse_command},
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{error::Error, io::stdout, path::PathBuf, thread, time::Duration};
use tracing::{debug, info, warn};

const COMMANDS: [&str; 15] = [
    "help", "ls", "cat", "create", "write", "rm", "stat", "bitmap", "block", "import", "export",
    "info", "fsck", "format", "exit",
];

pub fn start_shell(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = cli.resolve_config(args::prompt_method)?;
    let mut fs = FileSystem::new(config)?;
    info!(method = %fs.method(), "file system ready");

    if !cli.quiet {
        boot_animation(&fs)?;
    }

    let username = whoami::username();
    let hostname = whoami::devicename();

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline，历史记录文件放在 home 目录
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".allocfs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => warn!(error = %e, "history disabled"),
    }

    // 命令补全
    let commands: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!(
            "{}@{}:{}",
            username.green().bold(),
            hostname.cyan().bold(),
            fs.method().to_string().blue()
        )),
        DefaultPromptSegment::Basic("AllocFS".bright_blue().bold().to_string()),
    );

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        debug!(command = ?cmd, "executing");
                        if let Err(e) = execute_command(&cmd, &mut fs) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, command::Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or missing arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting AllocFS...".yellow());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
    Ok(())
}

/// 动态欢迎动画
fn boot_animation(fs: &FileSystem) -> Result<(), Box<dyn Error>> {
    let mut stdout = stdout();
    let usage = fs.usage();

    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    println!("{}", "[AllocFS Booting...]".bright_yellow().bold());
    thread::sleep(Duration::from_millis(300));

    let steps = [
        format!(
            "🧠 Initializing virtual disk ({} blocks x {} bytes)...",
            usage.total_blocks, usage.block_size
        ),
        format!("⚙️  Formatting with {} allocation...", fs.method()),
        "📁 Loading shell...".to_string(),
    ];

    for step in steps {
        println!("{}", step);
        thread::sleep(Duration::from_millis(300));
    }

    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }

    for i in 0..100 {
        pb.set_position(i);
        thread::sleep(Duration::from_millis(8));
    }
    pb.finish_with_message("✅ Ready!");

    thread::sleep(Duration::from_millis(300));
    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to AllocFS v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )?;
    Ok(())
}
