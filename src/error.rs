//! # 统一错误处理模块
//!
//! 定义 vasp-relax 的所有错误类型，使用 `thiserror` 派生。
//!
//! 作业数据库相关的错误单独定义为 [`RegistryError`]：
//! 控制器在调用处记录并忽略它们，其余错误全部向上传播。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// vasp-relax 统一错误类型
#[derive(Error, Debug)]
pub enum RelaxError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 配置错误（在任何调度器交互之前终止）
    // ─────────────────────────────────────────────────────────────
    #[error("Required file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required setting '{key}' in {file}")]
    MissingSetting { key: String, file: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // 计算状态错误
    // ─────────────────────────────────────────────────────────────
    #[error("Atom orderings are not permutations of each other: {0}")]
    InconsistentOrdering(String),

    #[error("Unexpected relaxation status: '{status}' and task: '{task}'")]
    UnexpectedStatus { status: String, task: String },

    #[error("Engine command failed in {dir}: {command}\n{stderr}")]
    EngineFailed {
        command: String,
        dir: String,
        stderr: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 作业数据库
    // ─────────────────────────────────────────────────────────────
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// 作业数据库 / 调度器交互错误
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Job database I/O failed: {path}: {reason}")]
    Database { path: String, reason: String },

    #[error("Unknown job id: {0}")]
    UnknownJob(String),

    #[error("Scheduler command '{command}' failed: {reason}")]
    Scheduler { command: String, reason: String },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RelaxError>;
