//! # 弛豫控制器
//!
//! 无状态的提交 / 运行 / 汇报流程。每次调用都从磁盘文件重新推导
//! `CalculationStatus`，因此进程可以在任意时刻中断后重新执行。
//!
//! - `submit`: 同一计算目录最多只有一个未结束的作业
//! - `run`: 执行一步引擎计算，收敛时写结果，未收敛时写设置快照
//! - `report`: 把最终输出按外部原子顺序写入结果文件
//!
//! 作业数据库的操作（查重、标记完成、标记出错）失败时只记录警告，
//! 不改变控制器对计算状态的判断。提交本身失败会向上传播。
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `relax/engine.rs`, `relax/registry.rs`, `relax/input.rs`,
//!   `relax/report.rs`, `relax/remap.rs`, `relax/settings.rs`

use crate::error::{RegistryError, RelaxError, Result};
use crate::models::{CalculationStatus, CalculationUnit, RelaxSettings, ResultsRecord, Task};
use crate::parsers::poscar::parse_poscar_file;
use crate::project;
use crate::relax::engine::EngineAdapter;
use crate::relax::input::InputWriter;
use crate::relax::registry::{JobHandle, JobRegistry, TaskStatus};
use crate::relax::remap::IndexRemapper;
use crate::relax::report;
use crate::relax::settings::snapshot;
use crate::utils::output;
use crate::utils::slurm::JobSpec;

use std::path::PathBuf;

/// `submit` 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// 已有未结束的作业，未提交
    AlreadyActive(JobHandle),
    Converged,
    Stalled,
    Submitted(JobHandle),
}

/// `run` 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Converged,
    /// 写出的设置快照路径
    Stalled { snapshot: PathBuf },
}

/// 一个计算单元的控制器
pub struct Controller<E, R, W> {
    unit: CalculationUnit,
    /// 已解析的设置
    settings: RelaxSettings,
    engine: E,
    registry: R,
    writer: W,
    /// 是否自动在作业数据库中标记完成 / 出错
    auto: bool,
    /// 作业中执行的命令
    run_command: String,
}

impl<E: EngineAdapter, R: JobRegistry, W: InputWriter> Controller<E, R, W> {
    pub fn new(
        unit: CalculationUnit,
        settings: RelaxSettings,
        engine: E,
        registry: R,
        writer: W,
    ) -> Self {
        let run_command = format!("vasp-relax run {}", unit.configdir.display());
        Controller {
            unit,
            settings,
            engine,
            registry,
            writer,
            auto: true,
            run_command,
        }
    }

    pub fn with_auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    pub fn with_run_command(mut self, command: impl Into<String>) -> Self {
        self.run_command = command.into();
        self
    }

    /// 提交作业
    pub fn submit(&mut self) -> Result<SubmitOutcome> {
        if let Some(handle) = self.find_active_job() {
            output::print_skip(&format!(
                "{}: job {} is already in the queue",
                self.unit.jobname, handle
            ));
            return Ok(SubmitOutcome::AlreadyActive(handle));
        }

        match self.engine.status()? {
            CalculationStatus::Converged => {
                output::print_done(&format!("{}: already converged", self.unit.jobname));
                self.mark_stale_complete();
                if !self.unit.results_file().is_file() {
                    self.report()?;
                }
                Ok(SubmitOutcome::Converged)
            }
            CalculationStatus::Stalled => {
                output::print_warning(&format!(
                    "{}: not converging, raise run_limit in {} to continue",
                    self.unit.jobname,
                    self.unit.snapshot_file.display()
                ));
                Ok(SubmitOutcome::Stalled)
            }
            CalculationStatus::NotStarted | CalculationStatus::InProgress(_) => {
                // 只有真正提交时才需要打包设置
                let spec = self.job_spec()?;
                let handle = self.registry.submit(&self.unit.calcdir, &spec)?;
                output::print_success(&format!(
                    "{}: submitted job {} ({} nodes x {} procs)",
                    self.unit.jobname, handle, spec.nodes, spec.procs_per_node
                ));
                Ok(SubmitOutcome::Submitted(handle))
            }
            other => Err(unexpected(&other)),
        }
    }

    /// 执行一步计算并处理终态
    pub fn run(&mut self) -> Result<RunOutcome> {
        let status = self.engine.status()?;
        output::print_info(&format!("{}: {}", self.unit.jobname, status));

        let status = match status {
            status if status.is_terminal() => status,
            CalculationStatus::NotStarted | CalculationStatus::InProgress(Task::Setup) => {
                self.writer.write_inputs(&self.unit, &self.settings)?;
                self.engine.run_step()?
            }
            CalculationStatus::InProgress(_) => self.engine.run_step()?,
            other => return Err(unexpected(&other)),
        };

        match status {
            CalculationStatus::Converged => {
                self.mark_active(|registry, handle| registry.mark_complete(handle));
                self.report()?;
                output::print_done(&format!("{}: converged", self.unit.jobname));
                Ok(RunOutcome::Converged)
            }
            CalculationStatus::Stalled => {
                self.mark_active(|registry, handle| registry.mark_error(handle, "Not converging"));
                let snapshot_file = self.unit.snapshot_file.clone();
                project::write_settings(&snapshot(&self.unit.settings, &self.settings), &snapshot_file)?;
                output::print_warning(&format!(
                    "{}: not converging, settings written to {}",
                    self.unit.jobname,
                    snapshot_file.display()
                ));
                Ok(RunOutcome::Stalled {
                    snapshot: snapshot_file,
                })
            }
            other => Err(unexpected(&other)),
        }
    }

    /// 写结果文件
    pub fn report(&self) -> Result<ResultsRecord> {
        let final_output = self.engine.read_final_output()?;
        let pos = parse_poscar_file(&self.unit.pos_file())?;

        let remapper = if self.unit.sort {
            IndexRemapper::from_orders(&self.engine.internal_order()?, &pos.labels())?
        } else {
            IndexRemapper::identity(final_output.basis.len())
        };

        let record = report::build_record(&final_output, &pos, &remapper)?;
        let path = self.unit.results_file();
        report::write_merged(&path, &record)?;
        output::print_success(&format!("Results written to {}", path.display()));
        Ok(record)
    }

    /// 作业规格：nodes = ceil(N / atom_per_proc / ppn)
    fn job_spec(&self) -> Result<JobSpec> {
        let missing = |key: &str| RelaxError::MissingSetting {
            key: key.to_string(),
            file: "relax.json".to_string(),
        };

        let atom_per_proc = self.settings.atom_per_proc.ok_or_else(|| missing("atom_per_proc"))?;
        let ppn = self.settings.ppn.ok_or_else(|| missing("ppn"))?;
        if atom_per_proc <= 0.0 || ppn == 0 {
            return Err(RelaxError::Configuration(
                "atom_per_proc and ppn must be positive".to_string(),
            ));
        }

        let natoms = parse_poscar_file(&self.unit.pos_file())?.atoms.len() as f64;
        let nodes = ((natoms / atom_per_proc / ppn as f64).ceil() as u32).max(1);

        Ok(JobSpec {
            name: self.unit.jobname.clone(),
            account: self.settings.account.clone(),
            nodes,
            procs_per_node: ppn,
            walltime: self.settings.walltime.clone(),
            memory_per_cpu: self.settings.pmem.clone(),
            qos: self.settings.qos.clone(),
            queue: self.settings.queue.clone(),
            message: self.settings.message.clone(),
            email: self.settings.email.clone(),
            priority: self.settings.priority,
            command: self.run_command.clone(),
        })
    }

    /// 查找同一计算目录下未结束的作业；状态查询失败的作业按未结束处理
    fn find_active_job(&mut self) -> Option<JobHandle> {
        let handles = match self.registry.find_by_directory(&self.unit.calcdir) {
            Ok(handles) => handles,
            Err(e) => {
                registry_warning(&e);
                return None;
            }
        };

        for handle in handles {
            match self.registry.job_status(&handle) {
                Ok(status) if status.is_terminal() => continue,
                Ok(_) => return Some(handle),
                Err(e) => {
                    registry_warning(&e);
                    return Some(handle);
                }
            }
        }
        None
    }

    /// 把同目录下尚未标记的旧作业标记为完成
    fn mark_stale_complete(&mut self) {
        if !self.auto {
            return;
        }

        let handles = match self.registry.find_by_directory(&self.unit.calcdir) {
            Ok(handles) => handles,
            Err(e) => return registry_warning(&e),
        };

        for handle in handles {
            let result = match self.registry.task_status(&handle) {
                Ok(TaskStatus::Complete) => Ok(()),
                Ok(_) => self.registry.mark_complete(&handle),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                registry_warning(&e);
            }
        }
    }

    /// 对当前作业执行一次标记操作
    fn mark_active<F>(&mut self, mark: F)
    where
        F: FnOnce(&mut R, &JobHandle) -> std::result::Result<(), RegistryError>,
    {
        if !self.auto {
            return;
        }

        match self.registry.active_job(&self.unit.calcdir) {
            Ok(Some(handle)) => {
                if let Err(e) = mark(&mut self.registry, &handle) {
                    registry_warning(&e);
                }
            }
            Ok(None) => output::print_info("No registered job for this calculation"),
            Err(e) => registry_warning(&e),
        }
    }
}

fn unexpected(status: &CalculationStatus) -> RelaxError {
    RelaxError::UnexpectedStatus {
        status: status.name().to_string(),
        task: status.task(),
    }
}

fn registry_warning(e: &RegistryError) {
    output::print_warning(&format!("Job database: {}", e));
}
