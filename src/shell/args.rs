use std::{error::Error, path::PathBuf};

use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Select};

use crate::fs::{
    alloc::AllocationMethod,
    config::{BlockSelection, FsConfig, NamePolicy},
};

#[derive(Parser, Debug, Default)]
#[command(name = "alloc-fs")]
#[command(about = "Block allocation simulator: contiguous, chained and indexed file layouts")]
pub struct Cli {
    /// Allocation method: contiguous | chained | indexed (asked interactively if omitted)
    pub method: Option<AllocationMethod>,

    /// TOML file with disk geometry and policies
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Accept mixed-case names with digits and . _ -
    #[arg(long)]
    pub permissive: bool,

    /// Pick free blocks at random with this seed instead of first-fit
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the boot animation
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// 合并配置文件与命令行参数；未指定分配方式时交给 `ask` 决定
    pub fn resolve_config(
        &self,
        ask: impl FnOnce() -> Result<AllocationMethod, Box<dyn Error>>,
    ) -> Result<FsConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => FsConfig::from_toml_file(path)?,
            None => FsConfig::default(),
        };

        // 命令行优先；配置文件里写了 method 也不再询问
        if let Some(method) = self.method {
            config.method = method;
        } else if self.config.is_none() {
            config.method = ask()?;
        }
        if self.permissive {
            config.names = NamePolicy::permissive();
        }
        if let Some(seed) = self.seed {
            config.selection = BlockSelection::Random { seed };
        }
        config.validate()?;
        Ok(config)
    }
}

/// 交互式选择分配方式
pub fn prompt_method() -> Result<AllocationMethod, Box<dyn Error>> {
    let items: Vec<&str> = AllocationMethod::ALL.iter().map(|m| m.as_str()).collect();
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Allocation method")
        .items(&items)
        .default(0)
        .interact()?;
    Ok(AllocationMethod::ALL[choice])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_method_and_flags_are_parsed() {
        let cli = Cli::try_parse_from(["alloc-fs", "indexed", "--seed", "9", "--permissive"])
            .unwrap();
        assert_eq!(cli.method, Some(AllocationMethod::Indexed));

        let config = cli
            .resolve_config(|| panic!("method was given on the command line"))
            .unwrap();
        assert_eq!(config.method, AllocationMethod::Indexed);
        assert_eq!(config.selection, BlockSelection::Random { seed: 9 });
        assert_eq!(config.names, NamePolicy::permissive());
    }

    #[test]
    fn missing_method_falls_back_to_the_prompt() {
        let cli = Cli::try_parse_from(["alloc-fs", "-q"]).unwrap();
        let config = cli
            .resolve_config(|| Ok(AllocationMethod::Chained))
            .unwrap();
        assert_eq!(config.method, AllocationMethod::Chained);
    }

    #[test]
    fn unknown_method_is_a_usage_error() {
        assert!(Cli::try_parse_from(["alloc-fs", "buddy"]).is_err());
    }
}
