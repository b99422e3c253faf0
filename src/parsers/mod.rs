//! # 解析器模块
//!
//! VASP 输入输出文件与项目设置文件的解析器。
//!
//! ## 依赖关系
//! - 被 `relax/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, incar, kpoints, species, vasprun, outcar

pub mod incar;
pub mod kpoints;
pub mod outcar;
pub mod poscar;
pub mod species;
pub mod vasprun;
