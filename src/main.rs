//! # vasp-relax - 可重入的 VASP 弛豫控制器
//!
//! 在项目目录树中提交、运行并汇报 VASP 结构弛豫。状态每次都从计算目录中的
//! 文件重新推导，作业数据库保证同一计算目录最多只有一个未结束的作业。
//!
//! ## 子命令
//! - `setup`  - 生成 VASP 输入文件
//! - `submit` - 提交弛豫作业到 Slurm
//! - `run`    - 执行弛豫直到收敛或达到运行次数上限
//! - `report` - 写出 properties.calc.json
//! - `status` - 弛豫状态表
//! - `jobs`   - 作业数据库记录
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── project.rs (项目布局与设置查找)
//!   │     └── relax/     (控制器、引擎、作业数据库)
//!   │           ├── parsers/ (VASP 文件解析器)
//!   │           └── models/  (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod project;
mod relax;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
