//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `setup`: 生成 VASP 输入文件
//! - `submit`: 提交弛豫作业（已有作业在队列中时跳过）
//! - `run`: 在作业中执行弛豫
//! - `report`: 写出 properties.calc.json
//! - `status`: 弛豫状态表
//! - `jobs`: 作业数据库记录
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: calc, jobs, status

pub mod calc;
pub mod jobs;
pub mod status;

use clap::{Parser, Subcommand};

/// vasp-relax - 可重入的 VASP 弛豫控制器
#[derive(Parser)]
#[command(name = "vasp-relax")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Submit, run and report VASP relaxations in a project tree", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Write INCAR, KPOINTS, POSCAR and POTCAR into the calculation directory
    Setup(calc::CalcArgs),

    /// Submit a relaxation job unless one is already queued or running
    Submit(calc::CalcArgs),

    /// Run the relaxation (normally called from inside the job)
    Run(calc::CalcArgs),

    /// Write the relaxed structure, forces and energy to properties.calc.json
    Report(calc::CalcArgs),

    /// Show relaxation status of one or many configurations
    Status(status::StatusArgs),

    /// List jobs in the job database
    Jobs(jobs::JobsArgs),
}
