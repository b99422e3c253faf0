//! # status 子命令 CLI 定义
//!
//! 显示一个或多个构型的弛豫状态
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/status.rs`

use clap::Args;
use std::path::PathBuf;

/// status 子命令参数
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Configuration directory, or a directory to search with --recursive
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Report every configuration (directory holding POS) below DIR
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,
}
