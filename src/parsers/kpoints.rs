//! # VASP KPOINTS 解析器
//!
//! 只支持自动网格形式（第二行为 0）：
//! ```text
//! Comment
//! 0
//! Gamma | Monkhorst-Pack | Auto
//! n1 n2 n3          # Auto 模式下为单个长度参数
//! s1 s2 s3          # 可选平移
//! ```
//! 非 Auto 模式的网格需要根据原胞与超胞的倒格矢长度缩放。
//!
//! ## 依赖关系
//! - 被 `relax/input.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{RelaxError, Result};
use crate::models::Lattice;
use std::fs;
use std::path::Path;

/// KPOINTS 文件
#[derive(Debug, Clone, PartialEq)]
pub struct Kpoints {
    pub comment: String,
    pub mode: String,
    /// Auto 模式下只有一个长度参数
    pub subdivisions: Vec<f64>,
    pub shift: Option<String>,
}

impl Kpoints {
    /// 读取 KPOINTS 文件
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// 从字符串解析
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let parse_error = |reason: &str| RelaxError::ParseError {
            format: "kpoints".to_string(),
            path: source.to_string(),
            reason: reason.to_string(),
        };

        let lines: Vec<&str> = content.lines().collect();
        if lines.len() < 4 {
            return Err(parse_error("File too short"));
        }

        if lines[1].trim() != "0" {
            return Err(parse_error("Only automatic mesh generation (0 points) is supported"));
        }

        let mode = lines[2].trim().to_string();
        if mode.is_empty() {
            return Err(parse_error("Missing generation mode"));
        }

        let subdivisions: Vec<f64> = lines[3]
            .split_whitespace()
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| parse_error("Invalid subdivision line"))?;

        let automatic = mode.starts_with(['A', 'a']);
        let expected = if automatic { 1 } else { 3 };
        if subdivisions.len() != expected {
            return Err(parse_error("Unexpected number of subdivisions"));
        }

        let shift = lines
            .get(4)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());

        Ok(Kpoints {
            comment: lines[0].trim().to_string(),
            mode,
            subdivisions,
            shift,
        })
    }

    /// 是否为完全自动模式（A/AUTO/Automatic），此时不需要原胞 POSCAR
    pub fn is_automatic(&self) -> bool {
        self.mode.starts_with(['A', 'a'])
    }

    /// 将原胞上的网格缩放到超胞上
    ///
    /// n_super = ceil(n_prim * |b_super| / |b_prim|)，至少为 1。
    pub fn scaled_to(&self, prim: &Lattice, supercell: &Lattice) -> Kpoints {
        if self.is_automatic() {
            return self.clone();
        }

        let prim_recip = prim.reciprocal_lengths();
        let super_recip = supercell.reciprocal_lengths();

        let subdivisions = self
            .subdivisions
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let scaled = if prim_recip[i] > 0.0 {
                    n * super_recip[i] / prim_recip[i]
                } else {
                    n
                };
                // 1e-8 容差避免浮点误差导致多加一格
                (scaled - 1e-8).ceil().max(1.0)
            })
            .collect();

        Kpoints {
            subdivisions,
            ..self.clone()
        }
    }

    /// 写出 KPOINTS 文本
    pub fn to_kpoints_string(&self) -> String {
        let subdivisions: Vec<String> = self
            .subdivisions
            .iter()
            .map(|n| {
                if self.is_automatic() {
                    n.to_string()
                } else {
                    format!("{}", *n as i64)
                }
            })
            .collect();

        let mut text = format!(
            "{}\n0\n{}\n{}\n",
            self.comment,
            self.mode,
            subdivisions.join(" ")
        );
        if let Some(shift) = &self.shift {
            text.push_str(shift);
            text.push('\n');
        }
        text
    }
}
