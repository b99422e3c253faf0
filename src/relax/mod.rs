//! # 弛豫流程模块
//!
//! 控制器及其协作者：设置解析、原子顺序映射、输入生成、
//! VASP 引擎、作业数据库与结果记录。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/`, `parsers/`, `project.rs`, `utils/`
//! - 子模块: controller, engine, input, registry, remap, report, settings

pub mod controller;
pub mod engine;
pub mod input;
pub mod registry;
pub mod remap;
pub mod report;
pub mod settings;

pub use controller::{Controller, RunOutcome, SubmitOutcome};
pub use engine::VaspRelax;
pub use input::{InputWriter, VaspInputWriter};
pub use registry::SlurmJobDb;
