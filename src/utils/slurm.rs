//! # Slurm 脚本生成工具
//!
//! 由作业规格生成 sbatch 提交脚本，并解析 `sbatch`/`squeue` 的输出。
//!
//! ## 依赖关系
//! - 被 `relax/registry.rs` 使用
//! - 无外部模块依赖

use std::path::Path;

/// 调度器作业规格
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub name: String,
    pub account: Option<String>,
    pub nodes: u32,
    pub procs_per_node: u32,
    pub walltime: Option<String>,
    pub memory_per_cpu: Option<String>,
    pub qos: Option<String>,
    pub queue: Option<String>,
    /// PBS 风格的邮件选项，例如 "abe"
    pub message: Option<String>,
    pub email: Option<String>,
    pub priority: Option<i32>,
    /// 作业中执行的命令
    pub command: String,
}

/// 生成 sbatch 脚本内容
pub fn generate_sbatch_script(spec: &JobSpec, workdir: &Path) -> String {
    let mut directives = vec![
        format!("#SBATCH -J {}", spec.name),
        format!("#SBATCH --nodes={}", spec.nodes),
        format!("#SBATCH --ntasks-per-node={}", spec.procs_per_node),
    ];

    if let Some(account) = &spec.account {
        directives.push(format!("#SBATCH -A {}", account));
    }
    if let Some(walltime) = &spec.walltime {
        directives.push(format!("#SBATCH --time {}", walltime));
    }
    if let Some(mem) = &spec.memory_per_cpu {
        directives.push(format!("#SBATCH --mem-per-cpu {}", mem));
    }
    if let Some(qos) = &spec.qos {
        directives.push(format!("#SBATCH --qos {}", qos));
    }
    if let Some(queue) = &spec.queue {
        directives.push(format!("#SBATCH --partition {}", queue));
    }
    if let Some(email) = &spec.email {
        directives.push(format!("#SBATCH --mail-user={}", email));
        let mail_type = spec
            .message
            .as_deref()
            .map(mail_type_from_pbs)
            .unwrap_or_else(|| "END,FAIL".to_string());
        directives.push(format!("#SBATCH --mail-type={}", mail_type));
    }
    if let Some(priority) = spec.priority {
        directives.push(format!("#SBATCH --nice={}", priority));
    }
    directives.push("#SBATCH -o %x.o%j".to_string());

    format!(
        r#"#!/bin/bash
{}

set -euo pipefail

cd "{}"
echo "PWD=$(pwd)"
echo "Running: {}"
{}

echo "Timings:"
sacct -o JobID,Submit,Start,End,CPUTime,State -j $SLURM_JOBID
"#,
        directives.join("\n"),
        workdir.display(),
        spec.command,
        spec.command,
    )
}

/// PBS 邮件选项 (a/b/e) 转换为 Slurm --mail-type
fn mail_type_from_pbs(message: &str) -> String {
    let mut types = Vec::new();
    if message.contains('b') {
        types.push("BEGIN");
    }
    if message.contains('e') {
        types.push("END");
    }
    if message.contains('a') {
        types.push("FAIL");
    }
    if types.is_empty() {
        "NONE".to_string()
    } else {
        types.join(",")
    }
}

/// 解析 `sbatch --parsable` 输出 ("12345" 或 "12345;cluster")
pub fn parse_sbatch_output(stdout: &str) -> Option<String> {
    let id = stdout.trim().split(';').next()?.trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit() || c == '_') {
        Some(id.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec {
            name: "SCEL1_1_1_1.0".to_string(),
            account: Some("physics".to_string()),
            nodes: 2,
            procs_per_node: 16,
            walltime: Some("24:00:00".to_string()),
            memory_per_cpu: None,
            qos: None,
            queue: Some("batch".to_string()),
            message: Some("ae".to_string()),
            email: Some("someone@example.org".to_string()),
            priority: None,
            command: "vasp-relax run /data/SCEL1_1_1_1/0".to_string(),
        }
    }

    #[test]
    fn test_script_directives() {
        let script = generate_sbatch_script(&spec(), Path::new("/data/SCEL1_1_1_1/0"));

        assert!(script.starts_with("#!/bin/bash\n#SBATCH -J SCEL1_1_1_1.0\n"));
        assert!(script.contains("#SBATCH --nodes=2\n"));
        assert!(script.contains("#SBATCH --ntasks-per-node=16\n"));
        assert!(script.contains("#SBATCH -A physics\n"));
        assert!(script.contains("#SBATCH --partition batch\n"));
        assert!(script.contains("#SBATCH --mail-type=END,FAIL\n"));
        assert!(!script.contains("--qos"));
        assert!(script.contains("\nvasp-relax run /data/SCEL1_1_1_1/0\n"));
    }

    #[test]
    fn test_parse_sbatch_output() {
        assert_eq!(parse_sbatch_output("12345\n"), Some("12345".to_string()));
        assert_eq!(parse_sbatch_output("678;cluster\n"), Some("678".to_string()));
        assert_eq!(parse_sbatch_output("error"), None);
    }
}
