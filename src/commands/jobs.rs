//! # jobs 命令实现
//!
//! 以表格列出作业数据库中的记录（按提交时间排序）。
//!
//! ## 依赖关系
//! - 使用 `cli/jobs.rs` 定义的参数
//! - 使用 `relax/registry.rs`, `tabled`

use crate::cli::jobs::JobsArgs;
use crate::error::Result;
use crate::relax::registry::{JobRecord, SlurmJobDb};
use crate::utils::output;

use std::fs;
use std::path::Path;
use tabled::{Table, Tabled};

/// 作业表中的一行
#[derive(Debug, Clone, Tabled)]
struct JobRow {
    #[tabled(rename = "Job ID")]
    jobid: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Job")]
    jobstatus: String,
    #[tabled(rename = "Task")]
    taskstatus: String,
    #[tabled(rename = "Submitted")]
    submitted: String,
}

impl From<&JobRecord> for JobRow {
    fn from(record: &JobRecord) -> Self {
        JobRow {
            jobid: record.jobid.to_string(),
            name: record.name.clone(),
            jobstatus: record.jobstatus.to_string(),
            taskstatus: record.taskstatus.to_string(),
            submitted: record.submitted_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// 执行 jobs 命令
pub fn execute(args: JobsArgs) -> Result<()> {
    let path = args.db.path();
    let db = SlurmJobDb::open(&path)?;

    // 相对路径按当前目录解析
    let filter = args
        .dir
        .as_ref()
        .map(|dir| fs::canonicalize(dir).unwrap_or_else(|_| dir.clone()));

    let rows = select(db.records(), filter.as_deref());
    if rows.is_empty() {
        output::print_info(&format!("No jobs in {}", path.display()));
        return Ok(());
    }

    output::print_header(&format!("Jobs ({})", path.display()));
    println!("{}", Table::new(&rows));
    Ok(())
}

fn select(records: &[JobRecord], dir: Option<&Path>) -> Vec<JobRow> {
    let mut selected: Vec<&JobRecord> = records
        .iter()
        .filter(|r| dir.map_or(true, |d| r.rundir.starts_with(d)))
        .collect();
    selected.sort_by_key(|r| r.submitted_at);
    selected.into_iter().map(JobRow::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relax::registry::{JobHandle, SchedulerStatus, TaskStatus};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn record(id: &str, rundir: &str, hour: u32) -> JobRecord {
        JobRecord {
            jobid: JobHandle(id.to_string()),
            name: format!("job{}", id),
            rundir: PathBuf::from(rundir),
            jobstatus: SchedulerStatus::Completed,
            taskstatus: TaskStatus::Error("Not converging".to_string()),
            submitted_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_select_filters_and_sorts() {
        let records = vec![
            record("2", "/p/training_data/A/0/calctype.default", 12),
            record("1", "/p/training_data/A/1/calctype.default", 9),
            record("3", "/q/training_data/B/0/calctype.default", 8),
        ];

        let rows = select(&records, Some(Path::new("/p/training_data")));
        let ids: Vec<&str> = rows.iter().map(|r| r.jobid.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(rows[0].jobstatus, "C");
        assert_eq!(rows[0].taskstatus, "Error: Not converging");
        assert_eq!(rows[0].submitted, "2024-03-01 09:00");

        assert_eq!(select(&records, None).len(), 3);
    }
}
