//! # 弛豫计算数据模型
//!
//! - `CalculationUnit`: 一个构型的一次弛豫，以计算目录为唯一标识
//! - `FinalOutput`: 引擎最终一步的输出（内部原子顺序）
//! - `ResultsRecord`: 写入 properties.calc.json 的结果（外部原子顺序）
//!
//! ## 依赖关系
//! - 被 `project.rs`, `parsers/vasprun.rs`, `relax/` 使用
//! - 使用 `models/settings.rs`

use super::settings::RelaxSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 一个构型的弛豫计算
#[derive(Debug, Clone)]
pub struct CalculationUnit {
    /// 构型目录（包含 POS）
    pub configdir: PathBuf,

    /// 计算目录 configdir/<calctype>，同时是作业数据库的键
    pub calcdir: PathBuf,

    /// relax.json 中存储的原始设置
    pub settings: RelaxSettings,

    /// 未收敛时写出的本地设置快照路径
    pub snapshot_file: PathBuf,

    /// 作业名称
    pub jobname: String,

    /// 是否按物种对原子排序后交给 VASP
    pub sort: bool,
}

impl CalculationUnit {
    /// 构型结构文件
    pub fn pos_file(&self) -> PathBuf {
        self.configdir.join("POS")
    }

    /// 结果记录文件
    pub fn results_file(&self) -> PathBuf {
        self.calcdir.join("properties.calc.json")
    }
}

/// run.final 目录
pub fn final_dir(calcdir: &Path) -> PathBuf {
    calcdir.join("run.final")
}

/// 引擎最终输出（内部原子顺序）
#[derive(Debug, Clone, PartialEq)]
pub struct FinalOutput {
    pub is_complete: bool,
    pub coord_mode: String,
    pub lattice: [[f64; 3]; 3],
    pub basis: Vec<[f64; 3]>,
    pub forces: Vec<[f64; 3]>,
    pub total_energy: f64,
}

/// properties.calc.json 的内容（外部原子顺序）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsRecord {
    pub is_complete: bool,
    pub atom_type: Vec<String>,
    pub atoms_per_type: Vec<usize>,
    pub coord_mode: String,
    pub relaxed_forces: Vec<[f64; 3]>,
    pub relaxed_basis: Vec<[f64; 3]>,
    pub relaxed_lattice: [[f64; 3]; 3],
    pub relaxed_energy: f64,
}
