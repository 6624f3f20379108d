use std::path::PathBuf;

use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.split_ascii_whitespace().collect();
    let (&cmd, args) = tokens.split_first()?;

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls),
        "cat" | "read" => args.first().map(|&name| Command::Cat(name.to_string())),
        "create" => Some(Command::Create(args.first()?.to_string(), tail(input, 2)?)),
        "write" | "update" => Some(Command::Write(args.first()?.to_string(), tail(input, 2)?)),
        "rm" | "delete" => args.first().map(|&name| Command::Rm(name.to_string())),
        "stat" => args.first().map(|&name| Command::Stat(name.to_string())),
        "bitmap" => Some(Command::Bitmap),
        "block" => args.first()?.parse().ok().map(Command::Block),
        "import" => match args {
            [host, name] => Some(Command::Import(PathBuf::from(host), name.to_string())),
            _ => None,
        },
        "export" => match args {
            [name, host] => Some(Command::Export(name.to_string(), PathBuf::from(host))),
            _ => None,
        },
        "info" => Some(Command::Info),
        "fsck" => Some(Command::Fsck),
        "format" => Some(Command::Format),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

/// 跳过前 n 个单词，剩下的部分原样作为文件内容（单词间的空白不做合并）
fn tail(input: &str, n: usize) -> Option<String> {
    let is_space = |c: char| c.is_ascii_whitespace();
    let mut rest = input.trim_start_matches(is_space);
    for _ in 0..n {
        let end = rest.find(is_space)?;
        rest = rest[end..].trim_start_matches(is_space);
    }
    (!rest.is_empty()).then(|| rest.to_string())
}
