//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `project.rs`, `relax/`, `utils/`
//! - 子模块: calc, jobs, status

pub mod calc;
pub mod jobs;
pub mod status;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Setup(args) => calc::setup(args),
        Commands::Submit(args) => calc::submit(args),
        Commands::Run(args) => calc::run(args),
        Commands::Report(args) => calc::report(args),
        Commands::Status(args) => status::execute(args),
        Commands::Jobs(args) => jobs::execute(args),
    }
}
