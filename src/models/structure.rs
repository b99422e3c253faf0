//! # 晶体结构数据模型
//!
//! 构型 POS 与 VASP POSCAR 共用的结构表示。原子顺序有意义：
//! 项目记录的顺序（外部顺序）与 VASP 使用的顺序（内部顺序）可能不同。
//!
//! ## 依赖关系
//! - 被 `parsers/poscar.rs`, `parsers/kpoints.rs` 使用
//! - 被 `relax/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 计算晶格体积
    pub fn volume(&self) -> f64 {
        let a = self.matrix[0];
        let b = self.matrix[1];
        let c = self.matrix[2];

        // 行列式计算
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 倒格矢长度 |b_i| = |a_j × a_k| / V（不含 2π）
    pub fn reciprocal_lengths(&self) -> [f64; 3] {
        let volume = self.volume().abs();
        let m = self.matrix;
        let mut lengths = [0.0; 3];
        for (i, length) in lengths.iter_mut().enumerate() {
            let u = m[(i + 1) % 3];
            let v = m[(i + 2) % 3];
            let cross = [
                u[1] * v[2] - u[2] * v[1],
                u[2] * v[0] - u[0] * v[2],
                u[0] * v[1] - u[1] * v[0],
            ];
            let norm = (cross[0].powi(2) + cross[1].powi(2) + cross[2].powi(2)).sqrt();
            *length = if volume > 0.0 { norm / volume } else { 0.0 };
        }
        lengths
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 物种标签（POS 中的名称）
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称（POSCAR 第一行）
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表，按文件中的顺序
    pub atoms: Vec<Atom>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
        }
    }

    /// 按原子顺序的物种标签
    pub fn labels(&self) -> Vec<String> {
        self.atoms.iter().map(|a| a.element.clone()).collect()
    }

    /// 物种列表及各物种原子数，按首次出现顺序
    pub fn species_counts(&self) -> (Vec<String>, Vec<usize>) {
        let mut species: Vec<String> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();

        for atom in &self.atoms {
            match species.iter().position(|s| *s == atom.element) {
                Some(idx) => counts[idx] += 1,
                None => {
                    species.push(atom.element.clone());
                    counts.push(1);
                }
            }
        }

        (species, counts)
    }

    /// 相邻同种原子合并成的块：(标签, 数量)
    ///
    /// POSCAR 的物种行与 POTCAR 拼接都按块进行，块可以重复出现。
    pub fn species_blocks(&self) -> Vec<(String, usize)> {
        let mut blocks: Vec<(String, usize)> = Vec::new();
        for atom in &self.atoms {
            match blocks.last_mut() {
                Some((label, count)) if *label == atom.element => *count += 1,
                _ => blocks.push((atom.element.clone(), 1)),
            }
        }
        blocks
    }

    /// 按标签稳定排序后的副本（VASP 使用的内部顺序）
    pub fn sorted_by_label(&self) -> Crystal {
        let mut sorted = self.clone();
        sorted.atoms.sort_by(|a, b| a.element.cmp(&b.element));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> Lattice {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    #[test]
    fn test_lattice_volume_cubic() {
        let vol = cubic(5.0).volume().abs();

        // 5^3 = 125
        assert!((vol - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_reciprocal_lengths_cubic() {
        let lengths = cubic(4.0).reciprocal_lengths();
        for l in lengths {
            assert!((l - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_species_counts_first_appearance() {
        let atoms = vec![
            Atom::new("Ni", [0.0, 0.0, 0.0]),
            Atom::new("Al", [0.5, 0.5, 0.0]),
            Atom::new("Ni", [0.5, 0.0, 0.5]),
        ];
        let crystal = Crystal::new("NiAl", cubic(3.5), atoms);

        let (species, counts) = crystal.species_counts();
        assert_eq!(species, vec!["Ni".to_string(), "Al".to_string()]);
        assert_eq!(counts, vec![2, 1]);
        assert_eq!(crystal.species_blocks().len(), 3);
    }

    #[test]
    fn test_sorted_by_label_is_stable() {
        let atoms = vec![
            Atom::new("B", [0.1, 0.0, 0.0]),
            Atom::new("A", [0.2, 0.0, 0.0]),
            Atom::new("B", [0.3, 0.0, 0.0]),
            Atom::new("A", [0.4, 0.0, 0.0]),
        ];
        let crystal = Crystal::new("AB", cubic(3.0), atoms);
        let sorted = crystal.sorted_by_label();

        let xs: Vec<f64> = sorted.atoms.iter().map(|a| a.position[0]).collect();
        assert_eq!(xs, vec![0.2, 0.4, 0.1, 0.3]);
        assert_eq!(
            sorted.species_blocks(),
            vec![("A".to_string(), 2), ("B".to_string(), 2)]
        );
    }
}
