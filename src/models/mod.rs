//! # 数据模型模块
//!
//! 定义晶体结构、弛豫设置、计算状态与结果记录。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `relax/` 和 `commands/` 使用
//! - 子模块: structure, settings, status, calculation

pub mod calculation;
pub mod settings;
pub mod status;
pub mod structure;

pub use calculation::{CalculationUnit, FinalOutput, ResultsRecord};
pub use settings::{RelaxSettings, Sentinel, Setting};
pub use status::{CalculationStatus, Task};
pub use structure::{Atom, Crystal, Lattice};
