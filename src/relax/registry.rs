//! # 作业数据库
//!
//! `JobRegistry` 是控制器与调度器之间的接口：按计算目录查找作业、
//! 查询调度器状态、标记任务完成或出错、提交新作业。
//! 计算目录是作业的唯一键，所有调用都显式传入。
//!
//! `SlurmJobDb` 是基于 JSON 文件的实现：作业表保存在本地文件中，
//! 调度器状态通过 `squeue` 刷新，提交通过 `sbatch`。
//!
//! ## 依赖关系
//! - 被 `relax/controller.rs`, `commands/` 使用
//! - 使用 `utils/slurm.rs` 生成提交脚本
//! - 使用 `serde_json`, `chrono`

use crate::error::RegistryError;
use crate::utils::slurm::{self, JobSpec};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 作业 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 调度器层面的作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStatus {
    Queued,
    Running,
    Held,
    Completed,
}

impl SchedulerStatus {
    /// 只有 Completed 是终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerStatus::Completed)
    }

    /// 由 `squeue -o %t` 的状态码转换
    fn from_squeue(code: &str) -> Self {
        match code {
            "PD" | "CF" => SchedulerStatus::Queued,
            "S" | "ST" | "RH" | "RQ" | "RS" | "SI" | "SO" => SchedulerStatus::Held,
            "" | "CD" | "CA" | "F" | "TO" | "NF" | "OOM" | "BF" | "DL" | "PR" => {
                SchedulerStatus::Completed
            }
            _ => SchedulerStatus::Running,
        }
    }
}

impl std::fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchedulerStatus::Queued => "Q",
            SchedulerStatus::Running => "R",
            SchedulerStatus::Held => "H",
            SchedulerStatus::Completed => "C",
        };
        write!(f, "{}", s)
    }
}

/// 任务层面的状态（计算本身是否完成）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Incomplete,
    Complete,
    Error(String),
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Incomplete => write!(f, "Incomplete"),
            TaskStatus::Complete => write!(f, "Complete"),
            TaskStatus::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// 作业表中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub jobid: JobHandle,
    pub name: String,
    pub rundir: PathBuf,
    pub jobstatus: SchedulerStatus,
    pub taskstatus: TaskStatus,
    pub submitted_at: DateTime<Utc>,
}

/// 控制器使用的作业数据库接口
pub trait JobRegistry {
    /// 以 `dir` 为运行目录的所有作业
    fn find_by_directory(&self, dir: &Path) -> Result<Vec<JobHandle>, RegistryError>;

    /// 调度器状态（可能需要查询调度器）
    fn job_status(&mut self, handle: &JobHandle) -> Result<SchedulerStatus, RegistryError>;

    /// 任务状态
    fn task_status(&self, handle: &JobHandle) -> Result<TaskStatus, RegistryError>;

    /// 当前正在为 `dir` 运行的作业
    fn active_job(&self, dir: &Path) -> Result<Option<JobHandle>, RegistryError>;

    fn mark_complete(&mut self, handle: &JobHandle) -> Result<(), RegistryError>;

    fn mark_error(&mut self, handle: &JobHandle, reason: &str) -> Result<(), RegistryError>;

    /// 在 `dir` 中提交一个新作业
    fn submit(&mut self, dir: &Path, spec: &JobSpec) -> Result<JobHandle, RegistryError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobTable {
    jobs: Vec<JobRecord>,
}

/// 基于 JSON 文件与 Slurm 的作业数据库
#[derive(Debug)]
pub struct SlurmJobDb {
    path: PathBuf,
    table: JobTable,
    /// 当前作业 ID（SLURM_JOB_ID）
    current_jobid: Option<String>,
}

impl SlurmJobDb {
    /// 打开作业表；文件不存在时为空表
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let table = if path.is_file() {
            let text = fs::read_to_string(path).map_err(|e| RegistryError::Database {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            serde_json::from_str(&text).map_err(|e| RegistryError::Database {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            JobTable::default()
        };

        Ok(SlurmJobDb {
            path: path.to_path_buf(),
            table,
            current_jobid: std::env::var("SLURM_JOB_ID").ok(),
        })
    }

    /// 指定当前作业 ID
    #[cfg(test)]
    pub fn with_current_job(mut self, jobid: Option<String>) -> Self {
        self.current_jobid = jobid;
        self
    }

    /// 默认作业表路径 ~/.vasp-relax/jobdb.json
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vasp-relax")
            .join("jobdb.json")
    }

    /// 所有作业记录
    pub fn records(&self) -> &[JobRecord] {
        &self.table.jobs
    }

    /// 插入一条记录并保存
    pub fn insert(&mut self, record: JobRecord) -> Result<(), RegistryError> {
        self.table.jobs.retain(|r| r.jobid != record.jobid);
        self.table.jobs.push(record);
        self.save()
    }

    fn save(&self) -> Result<(), RegistryError> {
        let db_error = |reason: String| RegistryError::Database {
            path: self.path.display().to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| db_error(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(&self.table).map_err(|e| db_error(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| db_error(e.to_string()))
    }

    fn record(&self, handle: &JobHandle) -> Result<&JobRecord, RegistryError> {
        self.table
            .jobs
            .iter()
            .find(|r| r.jobid == *handle)
            .ok_or_else(|| RegistryError::UnknownJob(handle.0.clone()))
    }

    fn record_mut(&mut self, handle: &JobHandle) -> Result<&mut JobRecord, RegistryError> {
        self.table
            .jobs
            .iter_mut()
            .find(|r| r.jobid == *handle)
            .ok_or_else(|| RegistryError::UnknownJob(handle.0.clone()))
    }

    /// 通过 squeue 查询作业状态
    fn query_squeue(jobid: &str) -> Result<SchedulerStatus, RegistryError> {
        let output = Command::new("squeue")
            .args(["-h", "-j", jobid, "-o", "%t"])
            .output()
            .map_err(|e| RegistryError::Scheduler {
                command: "squeue".to_string(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            return Ok(SchedulerStatus::from_squeue(stdout.trim()));
        }

        // 已清出队列的作业
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Invalid job id") {
            Ok(SchedulerStatus::Completed)
        } else {
            Err(RegistryError::Scheduler {
                command: format!("squeue -j {}", jobid),
                reason: stderr.trim().to_string(),
            })
        }
    }
}

impl JobRegistry for SlurmJobDb {
    fn find_by_directory(&self, dir: &Path) -> Result<Vec<JobHandle>, RegistryError> {
        Ok(self
            .table
            .jobs
            .iter()
            .filter(|r| r.rundir == dir)
            .map(|r| r.jobid.clone())
            .collect())
    }

    fn job_status(&mut self, handle: &JobHandle) -> Result<SchedulerStatus, RegistryError> {
        let cached = self.record(handle)?.jobstatus;
        if cached.is_terminal() {
            return Ok(cached);
        }

        let status = Self::query_squeue(&handle.0)?;
        if status != cached {
            self.record_mut(handle)?.jobstatus = status;
            self.save()?;
        }
        Ok(status)
    }

    fn task_status(&self, handle: &JobHandle) -> Result<TaskStatus, RegistryError> {
        Ok(self.record(handle)?.taskstatus.clone())
    }

    fn active_job(&self, dir: &Path) -> Result<Option<JobHandle>, RegistryError> {
        if let Some(jobid) = &self.current_jobid {
            if let Some(record) = self
                .table
                .jobs
                .iter()
                .find(|r| r.jobid.0 == *jobid && r.rundir == dir)
            {
                return Ok(Some(record.jobid.clone()));
            }
        }

        Ok(self
            .table
            .jobs
            .iter()
            .filter(|r| r.rundir == dir && r.taskstatus == TaskStatus::Incomplete)
            .max_by_key(|r| r.submitted_at)
            .map(|r| r.jobid.clone()))
    }

    fn mark_complete(&mut self, handle: &JobHandle) -> Result<(), RegistryError> {
        self.record_mut(handle)?.taskstatus = TaskStatus::Complete;
        self.save()
    }

    fn mark_error(&mut self, handle: &JobHandle, reason: &str) -> Result<(), RegistryError> {
        self.record_mut(handle)?.taskstatus = TaskStatus::Error(reason.to_string());
        self.save()
    }

    fn submit(&mut self, dir: &Path, spec: &JobSpec) -> Result<JobHandle, RegistryError> {
        let script_path = dir.join("submit.sbatch");
        fs::write(&script_path, slurm::generate_sbatch_script(spec, dir)).map_err(|e| {
            RegistryError::Database {
                path: script_path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let output = Command::new("sbatch")
            .arg("--parsable")
            .arg(&script_path)
            .current_dir(dir)
            .output()
            .map_err(|e| RegistryError::Scheduler {
                command: "sbatch".to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RegistryError::Scheduler {
                command: format!("sbatch {}", script_path.display()),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let jobid = slurm::parse_sbatch_output(&stdout).ok_or_else(|| RegistryError::Scheduler {
            command: "sbatch".to_string(),
            reason: format!("Unexpected output '{}'", stdout.trim()),
        })?;

        let handle = JobHandle(jobid);
        self.insert(JobRecord {
            jobid: handle.clone(),
            name: spec.name.clone(),
            rundir: dir.to_path_buf(),
            jobstatus: SchedulerStatus::Queued,
            taskstatus: TaskStatus::Incomplete,
            submitted_at: Utc::now(),
        })?;

        Ok(handle)
    }
}
