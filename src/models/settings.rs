//! # 弛豫设置数据模型
//!
//! `relax.json` 的内容。资源类字段可以是具体数值，也可以是占位符，
//! 占位符在运行时由 `relax/settings.rs` 解析。
//!
//! ## 依赖关系
//! - 被 `project.rs`, `relax/` 使用
//! - 使用 `serde`, `serde_json`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 资源字段占位符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentinel {
    /// 从调度器环境变量推导
    #[serde(rename = "derive-from-environment", alias = "CASM_DEFAULT")]
    DeriveFromEnvironment,
    /// 交给 VASP 自己决定
    #[serde(rename = "engine-default", alias = "VASP_DEFAULT")]
    EngineDefault,
}

/// 资源字段取值：具体数值或占位符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Value(u32),
    Sentinel(Sentinel),
}

impl Setting {
    /// 具体数值，占位符返回 None
    pub fn value(&self) -> Option<u32> {
        match self {
            Setting::Value(v) => Some(*v),
            Setting::Sentinel(_) => None,
        }
    }
}

/// relax.json 存储的设置
///
/// 未识别的键保存在 `extra` 中，写回快照时原样输出。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelaxSettings {
    // ─────────────────────────────────────────────────────────────
    // 调度器
    // ─────────────────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atom_per_proc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walltime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    // ─────────────────────────────────────────────────────────────
    // VASP 并行参数
    // ─────────────────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncore: Option<Setting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npar: Option<Setting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpar: Option<Setting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncpus: Option<Setting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vasp_cmd: Option<String>,

    // ─────────────────────────────────────────────────────────────
    // 弛豫流程
    // ─────────────────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_limit: Option<Setting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_input_files: Option<Vec<String>>,
    /// run.0 使用的 INCAR 覆盖文件
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    /// run.final 使用的 INCAR 覆盖文件
    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_incar: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RelaxSettings {
    /// 解析后的运行次数上限；未解析时视为 None
    pub fn run_limit_value(&self) -> Option<u32> {
        self.run_limit.and_then(|s| s.value())
    }

    pub fn npar_value(&self) -> Option<u32> {
        self.npar.and_then(|s| s.value())
    }

    pub fn ncore_value(&self) -> Option<u32> {
        self.ncore.and_then(|s| s.value())
    }

    pub fn kpar_value(&self) -> Option<u32> {
        self.kpar.and_then(|s| s.value())
    }

    pub fn ncpus_value(&self) -> Option<u32> {
        self.ncpus.and_then(|s| s.value())
    }

    /// 所有额外输入文件名（extra_input_files + initial + final）
    pub fn input_file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.extra_input_files.clone().unwrap_or_default();
        names.extend(self.initial.iter().cloned());
        names.extend(self.final_incar.iter().cloned());
        names
    }
}
