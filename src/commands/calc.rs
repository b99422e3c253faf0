//! # 单个构型的命令实现
//!
//! `setup`, `submit`, `run`, `report` 都作用于一个构型目录：
//! 定位项目、读取并解析设置，然后交给控制器。
//!
//! ## 依赖关系
//! - 使用 `cli/calc.rs` 定义的参数
//! - 使用 `project.rs`, `relax/`, `utils/output.rs`

use crate::cli::calc::CalcArgs;
use crate::error::{RelaxError, Result};
use crate::models::{CalculationUnit, RelaxSettings};
use crate::project::Project;
use crate::relax::settings::{resolve, Environment};
use crate::relax::{
    Controller, InputWriter, RunOutcome, SlurmJobDb, SubmitOutcome, VaspInputWriter, VaspRelax,
};
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

type VaspController = Controller<VaspRelax, SlurmJobDb, VaspInputWriter>;

/// 生成输入文件
pub fn setup(args: CalcArgs) -> Result<()> {
    output::print_header("Setup");
    let (project, unit, settings) = load(&args)?;
    VaspInputWriter::new(project).write_inputs(&unit, &settings)
}

/// 提交作业
pub fn submit(args: CalcArgs) -> Result<()> {
    output::print_header("Submit");
    let mut controller = build(&args)?;

    match controller.submit()? {
        SubmitOutcome::Submitted(handle) => {
            output::print_info(&format!("Track with: squeue -j {}", handle))
        }
        SubmitOutcome::AlreadyActive(_) | SubmitOutcome::Converged | SubmitOutcome::Stalled => {}
    }
    Ok(())
}

/// 执行弛豫
pub fn run(args: CalcArgs) -> Result<()> {
    output::print_header("Run");
    let mut controller = build(&args)?;

    if let RunOutcome::Stalled { snapshot } = controller.run()? {
        output::print_info(&format!(
            "Edit run_limit in {} and submit again to continue",
            snapshot.display()
        ));
    }
    Ok(())
}

/// 写结果文件
pub fn report(args: CalcArgs) -> Result<()> {
    output::print_header("Report");
    build(&args)?.report().map(|_| ())
}

/// 定位项目并读取设置，返回 (项目, 计算单元, 已解析设置)
fn load(args: &CalcArgs) -> Result<(Project, CalculationUnit, RelaxSettings)> {
    let configdir = fs::canonicalize(&args.configdir).map_err(|_| RelaxError::DirectoryNotFound {
        path: args.configdir.display().to_string(),
    })?;

    let project = Project::locate(&configdir)?;
    let unit = project.calculation_unit(&configdir, !args.no_sort)?;
    let settings = resolve(&unit.settings, &Environment::from_process());

    output::print_info(&format!(
        "{} ({})",
        unit.jobname,
        unit.calcdir.display()
    ));
    Ok((project, unit, settings))
}

fn build(args: &CalcArgs) -> Result<VaspController> {
    let (project, unit, settings) = load(args)?;
    let jobdb = args.db.path();

    let registry = SlurmJobDb::open(&jobdb)?;
    let engine = VaspRelax::new(&unit.calcdir, settings.clone());
    let command = run_command(&unit.configdir, &jobdb, args);

    Ok(Controller::new(
        unit,
        settings,
        engine,
        registry,
        VaspInputWriter::new(project),
    )
    .with_auto(!args.no_auto)
    .with_run_command(command))
}

/// 作业中执行的命令：重复当前的选项
fn run_command(configdir: &Path, jobdb: &Path, args: &CalcArgs) -> String {
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("vasp-relax"));

    let mut command = format!(
        "{} run {} --jobdb {}",
        exe.display(),
        configdir.display(),
        jobdb.display()
    );
    if args.no_sort {
        command.push_str(" --no-sort");
    }
    if args.no_auto {
        command.push_str(" --no-auto");
    }
    command
}
