//! # 计算状态
//!
//! 从运行目录中的文件推导出的弛豫状态。状态从不持久化，
//! 每次调用都重新计算，因此控制器在进程重启之间是无状态的。
//!
//! ## 依赖关系
//! - 被 `relax/engine.rs`, `relax/controller.rs` 使用
//! - 被 `commands/status.rs` 使用

use std::fmt;

/// 进行中计算的下一步任务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// 需要首次生成输入文件
    Setup,
    /// 继续结构弛豫（新建 run.i）
    Relax,
    /// 最终的定体积计算（run.final）
    Constant,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Setup => write!(f, "setup"),
            Task::Relax => write!(f, "relax"),
            Task::Constant => write!(f, "constant"),
        }
    }
}

/// 弛豫计算状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationStatus {
    NotStarted,
    InProgress(Task),
    Converged,
    /// 达到运行次数上限仍未收敛
    Stalled,
    /// 引擎报告了无法安全处理的状态
    Unexpected { status: String, task: String },
}

impl CalculationStatus {
    /// 状态名称（用于输出与错误信息）
    pub fn name(&self) -> &str {
        match self {
            CalculationStatus::NotStarted => "not_started",
            CalculationStatus::InProgress(_) => "in_progress",
            CalculationStatus::Converged => "converged",
            CalculationStatus::Stalled => "stalled",
            CalculationStatus::Unexpected { status, .. } => status,
        }
    }

    /// 任务名称，无任务时为空字符串
    pub fn task(&self) -> String {
        match self {
            CalculationStatus::InProgress(task) => task.to_string(),
            CalculationStatus::Unexpected { task, .. } => task.clone(),
            _ => String::new(),
        }
    }

    /// 是否为终态（无需再运行引擎）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CalculationStatus::Converged | CalculationStatus::Stalled
        )
    }
}

impl fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationStatus::InProgress(task) => write!(f, "in_progress ({})", task),
            CalculationStatus::Unexpected { status, task } => {
                write!(f, "unexpected ({}, {})", status, task)
            }
            other => write!(f, "{}", other.name()),
        }
    }
}
