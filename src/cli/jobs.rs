//! # jobs 子命令 CLI 定义
//!
//! 列出作业数据库中的记录
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs`, `cli/calc.rs` 使用
//! - 参数传递给 `commands/jobs.rs`

use crate::relax::SlurmJobDb;
use clap::Args;
use std::path::PathBuf;

/// 作业数据库位置
#[derive(Args, Debug)]
pub struct JobDbArgs {
    /// Job database file [default: ~/.vasp-relax/jobdb.json]
    #[arg(long, env = "VASP_RELAX_JOBDB")]
    pub jobdb: Option<PathBuf>,
}

impl JobDbArgs {
    pub fn path(&self) -> PathBuf {
        self.jobdb.clone().unwrap_or_else(SlurmJobDb::default_path)
    }
}

/// jobs 子命令参数
#[derive(Args, Debug)]
pub struct JobsArgs {
    /// Only list jobs whose run directory is below this path
    #[arg(long)]
    pub dir: Option<PathBuf>,

    #[command(flatten)]
    pub db: JobDbArgs,
}
