//! # status 命令实现
//!
//! 从磁盘文件推导弛豫状态并以表格显示，不修改任何文件。
//!
//! ## 依赖关系
//! - 使用 `cli/status.rs` 定义的参数
//! - 使用 `project.rs`, `relax/engine.rs`, `relax/settings.rs`
//! - 使用 `walkdir` 查找构型目录, `tabled` 输出表格

use crate::cli::status::StatusArgs;
use crate::error::{RelaxError, Result};
use crate::models::RelaxSettings;
use crate::project::{self, Project};
use crate::relax::engine::{EngineAdapter, VaspRelax};
use crate::relax::settings::{resolve, Environment};
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};
use walkdir::WalkDir;

/// 状态表中的一行
#[derive(Debug, Clone, Tabled)]
struct StatusRow {
    #[tabled(rename = "Configuration")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Task")]
    task: String,
}

/// 执行 status 命令
pub fn execute(args: StatusArgs) -> Result<()> {
    let dir = fs::canonicalize(&args.dir).map_err(|_| RelaxError::DirectoryNotFound {
        path: args.dir.display().to_string(),
    })?;
    let project = Project::locate(&dir)?;

    let configdirs = if args.recursive {
        find_configurations(&dir)
    } else {
        vec![dir]
    };

    if configdirs.is_empty() {
        output::print_warning("No configurations (directories holding POS) found");
        return Ok(());
    }

    let env = Environment::from_process();
    let rows: Vec<StatusRow> = configdirs
        .iter()
        .map(|configdir| status_row(&project, configdir, &env))
        .collect();

    output::print_header(&format!("Relaxation status ({})", project.calctype));
    println!("{}", Table::new(&rows));
    Ok(())
}

/// 所有包含 POS 的目录，按路径排序
fn find_configurations(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == "POS")
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .collect();
    dirs.sort();
    dirs
}

fn status_row(project: &Project, configdir: &Path, env: &Environment) -> StatusRow {
    let name = project.jobname(configdir);

    let stored = match project.settings_path(configdir, "relax.json") {
        Some(path) => project::read_settings(&path),
        None => Ok(RelaxSettings::default()),
    };

    let status = stored.and_then(|stored| {
        let settings = resolve(&stored, env);
        VaspRelax::new(&configdir.join(&project.calctype), settings).status()
    });

    match status {
        Ok(status) => StatusRow {
            name,
            status: status.name().to_string(),
            task: status.task(),
        },
        Err(e) => StatusRow {
            name,
            status: "error".to_string(),
            task: e.to_string(),
        },
    }
}
