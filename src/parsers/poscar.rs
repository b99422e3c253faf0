//! # VASP POSCAR 格式解析器
//!
//! 解析构型的 POS 文件以及 POSCAR/CONTCAR，并按给定原子顺序写出 POSCAR。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # species labels (VASP 5+)
//! n1 n2 ...              # number of atoms per label
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `relax/` 使用
//! - 使用 `models/structure.rs`

use crate::error::{RelaxError, Result};
use crate::models::{Atom, Crystal, Lattice};
use std::fs;
use std::path::Path;

/// 解析 POS/POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal> {
    if !path.is_file() {
        return Err(RelaxError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 POSCAR 格式
///
/// `source` 只用于错误信息。
pub fn parse_poscar_content(content: &str, source: &str) -> Result<Crystal> {
    let parse_error = |reason: String| RelaxError::ParseError {
        format: "poscar".to_string(),
        path: source.to_string(),
        reason,
    };

    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error("File too short".to_string()));
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .trim()
        .parse()
        .map_err(|_| parse_error(format!("Invalid scaling factor '{}'", lines[1].trim())))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for i in 0..3 {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(format!(
                "Invalid lattice vector at line {}",
                3 + i
            )));
        }
        matrix[i] = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: species labels (VASP 5+); VASP 4 files without labels are rejected,
    // the labels define the atom ordering
    let labels: Vec<String> = lines[5].split_whitespace().map(|s| s.to_string()).collect();
    if labels.is_empty() || labels[0].parse::<i64>().is_ok() {
        return Err(parse_error(
            "Missing species line (VASP 5 format required)".to_string(),
        ));
    }

    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| parse_error("Invalid atom count line".to_string()))?;
    if counts.len() != labels.len() {
        return Err(parse_error(format!(
            "{} species labels but {} counts",
            labels.len(),
            counts.len()
        )));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    if lines[coord_line]
        .trim()
        .to_lowercase()
        .starts_with('s')
    {
        coord_line += 1;
    }

    if lines.len() <= coord_line {
        return Err(parse_error("Missing coordinate type line".to_string()));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let total: usize = counts.iter().sum();
    let mut atoms: Vec<Atom> = Vec::with_capacity(total);
    let mut line_idx = coord_line + 1;

    for (label, &count) in labels.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .map(|l| {
                    l.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();

            if parts.len() < 3 {
                return Err(parse_error(format!(
                    "Expected {} positions, invalid entry at line {}",
                    total,
                    line_idx + 1
                )));
            }

            let position = if is_cartesian {
                cart_to_frac([parts[0] * scale, parts[1] * scale, parts[2] * scale], &lattice)
            } else {
                [parts[0], parts[1], parts[2]]
            };
            atoms.push(Atom::new(label.clone(), position));
            line_idx += 1;
        }
    }

    Ok(Crystal::new(name, lattice, atoms))
}

/// 笛卡尔坐标转分数坐标
fn cart_to_frac(cart: [f64; 3], lattice: &Lattice) -> [f64; 3] {
    let m = lattice.matrix;
    let det = lattice.volume();

    if det.abs() < 1e-10 {
        return cart;
    }

    let inv = [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
        ],
    ];

    // r_frac = r_cart · M^-1 (行向量约定)
    [
        cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
        cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
        cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
    ]
}

/// 将 Crystal 按原子顺序写成 POSCAR 字符串
///
/// 相邻同种原子合并为一个物种块，原子顺序保持不变。
pub fn to_poscar_string(crystal: &Crystal) -> String {
    let blocks = crystal.species_blocks();
    let mut result = String::new();

    // Line 0: Comment
    result.push_str(&format!("{}\n", crystal.name));

    // Line 1: Scale
    result.push_str("1.0\n");

    // Lines 2-4: Lattice
    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    // Species labels and counts
    let labels: Vec<&str> = blocks.iter().map(|(l, _)| l.as_str()).collect();
    let counts: Vec<String> = blocks.iter().map(|(_, c)| c.to_string()).collect();
    result.push_str(&format!("   {}\n", labels.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));

    // Coordinate type
    result.push_str("Direct\n");

    for atom in &crystal.atoms {
        let pos = atom.position;
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            pos[0], pos[1], pos[2]
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poscar_vasp5() {
        let content = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;
        let crystal = parse_poscar_content(content, "NaCl").unwrap();
        assert_eq!(crystal.name, "NaCl");
        assert_eq!(crystal.atoms.len(), 8);

        let na_count = crystal.atoms.iter().filter(|a| a.element == "Na").count();
        assert_eq!(na_count, 4);
        assert_eq!(crystal.atoms[4].element, "Cl");
    }

    #[test]
    fn test_parse_poscar_with_scale() {
        let content = r#"Si
2.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Si
2
Direct
0.0 0.0 0.0
0.5 0.5 0.5
"#;
        let crystal = parse_poscar_content(content, "Si").unwrap();

        // 2.0 * 2.0 = 4.0
        assert!((crystal.lattice.matrix[0][0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_poscar_cartesian() {
        let content = r#"Fe cart
1.0
4.0 0.0 0.0
0.0 4.0 0.0
0.0 0.0 4.0
Fe
1
Cartesian
2.0 1.0 0.0
"#;
        let crystal = parse_poscar_content(content, "Fe").unwrap();
        let p = crystal.atoms[0].position;
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!((p[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_parse_poscar_selective_dynamics() {
        let content = r#"Fe with selective
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
2
Selective dynamics
Direct
0.0 0.0 0.0 T T T
0.5 0.5 0.5 F F F
"#;
        let crystal = parse_poscar_content(content, "Fe").unwrap();
        assert_eq!(crystal.atoms.len(), 2);
    }

    #[test]
    fn test_parse_poscar_missing_positions() {
        let content = r#"short
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
3
Direct
0.0 0.0 0.0
"#;
        assert!(parse_poscar_content(content, "short").is_err());
    }

    #[test]
    fn test_write_keeps_interleaved_order() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let atoms = vec![
            Atom::new("A", [0.0, 0.0, 0.0]),
            Atom::new("B", [0.5, 0.5, 0.0]),
            Atom::new("A", [0.5, 0.0, 0.5]),
        ];
        let crystal = Crystal::new("ABA", lattice, atoms);

        let text = to_poscar_string(&crystal);
        let parsed = parse_poscar_content(&text, "ABA").unwrap();

        assert_eq!(parsed.labels(), vec!["A", "B", "A"]);
        assert!((parsed.atoms[2].position[2] - 0.5).abs() < 1e-9);
    }
}
