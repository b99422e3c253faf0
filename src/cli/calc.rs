//! # 单个构型的子命令 CLI 定义
//!
//! `setup`, `submit`, `run`, `report` 共用的参数
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/calc.rs`

use super::jobs::JobDbArgs;
use clap::Args;
use std::path::PathBuf;

/// 单个构型的参数
#[derive(Args, Debug)]
pub struct CalcArgs {
    /// Configuration directory (the one holding POS)
    #[arg(default_value = ".")]
    pub configdir: PathBuf,

    /// Keep the POS atom order instead of grouping atoms by species
    #[arg(long, default_value_t = false)]
    pub no_sort: bool,

    /// Do not mark jobs complete / errored in the job database
    #[arg(long, default_value_t = false)]
    pub no_auto: bool,

    #[command(flatten)]
    pub db: JobDbArgs,
}
