//! # VASP vasprun.xml 解析器
//!
//! 只提取最终结果所需的字段：最终结构（finalpos）、最后一步的受力、
//! 最后一个 `e_fr_energy`，以及文件是否完整（`</modeling>` 结尾）。
//! vasprun.xml 中的坐标总是分数坐标。
//!
//! ## 依赖关系
//! - 被 `relax/engine.rs` 使用
//! - 使用 `models/calculation.rs`
//! - 使用 `regex` crate

use crate::error::{RelaxError, Result};
use crate::models::FinalOutput;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// `<v>x y z</v>` 行
static ROW_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<v[^>]*>([^<]*)</v>").expect("row pattern is valid"));

static ENERGY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<i\s+name="e_fr_energy"\s*>\s*([^<\s]+)\s*</i>"#)
        .expect("energy pattern is valid")
});

/// 解析 vasprun.xml 文件
pub fn parse_vasprun_file(path: &Path) -> Result<FinalOutput> {
    if !path.is_file() {
        return Err(RelaxError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_vasprun_content(&content, &path.display().to_string())
}

/// 从字符串内容解析
pub fn parse_vasprun_content(content: &str, source: &str) -> Result<FinalOutput> {
    let parse_error = |reason: String| RelaxError::ParseError {
        format: "vasprun".to_string(),
        path: source.to_string(),
        reason,
    };

    let is_complete = content.contains("</modeling>");

    // 优先 finalpos；未完成的计算退回到最后一个结构
    let structure = find_block(content, r#"<structure name="finalpos""#, "</structure>")
        .or_else(|| rfind_block(content, "<structure", "</structure>"))
        .ok_or_else(|| parse_error("No <structure> block".to_string()))?;

    let lattice_rows = varray_rows(structure, "basis")
        .ok_or_else(|| parse_error("No lattice (basis) in final structure".to_string()))?;
    if lattice_rows.len() != 3 {
        return Err(parse_error(format!(
            "Lattice has {} vectors",
            lattice_rows.len()
        )));
    }
    let lattice = [lattice_rows[0], lattice_rows[1], lattice_rows[2]];

    let basis = varray_rows(structure, "positions")
        .ok_or_else(|| parse_error("No positions in final structure".to_string()))?;

    let forces = rfind_block(content, r#"<varray name="forces""#, "</varray>")
        .map(parse_rows)
        .transpose()
        .map_err(parse_error)?
        .ok_or_else(|| parse_error("No forces".to_string()))?;

    if forces.len() != basis.len() {
        return Err(parse_error(format!(
            "{} forces for {} atoms",
            forces.len(),
            basis.len()
        )));
    }

    let total_energy = ENERGY_PATTERN
        .captures_iter(content)
        .last()
        .and_then(|c| c.get(1))
        .ok_or_else(|| parse_error("No e_fr_energy".to_string()))?
        .as_str()
        .parse::<f64>()
        .map_err(|e| parse_error(format!("Invalid energy: {}", e)))?;

    Ok(FinalOutput {
        is_complete,
        coord_mode: "direct".to_string(),
        lattice,
        basis,
        forces,
        total_energy,
    })
}

/// 第一个 `start..end` 块
fn find_block<'a>(content: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = content.find(start)?;
    let len = content[from..].find(end)?;
    Some(&content[from..from + len])
}

/// 最后一个 `start..end` 块
fn rfind_block<'a>(content: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = content.rfind(start)?;
    let len = content[from..].find(end)?;
    Some(&content[from..from + len])
}

fn varray_rows(structure: &str, name: &str) -> Option<Vec<[f64; 3]>> {
    let block = find_block(structure, &format!(r#"<varray name="{}""#, name), "</varray>")?;
    parse_rows(block).ok()
}

fn parse_rows(block: &str) -> std::result::Result<Vec<[f64; 3]>, String> {
    ROW_PATTERN
        .captures_iter(block)
        .filter_map(|c| c.get(1))
        .map(|m| {
            let values: Vec<f64> = m
                .as_str()
                .split_whitespace()
                .map(|s| s.parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| format!("Invalid vector '{}': {}", m.as_str().trim(), e))?;
            if values.len() != 3 {
                return Err(format!("Expected 3 components in '{}'", m.as_str().trim()));
            }
            Ok([values[0], values[1], values[2]])
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 两个原子的最小 vasprun.xml
    pub(crate) fn sample_vasprun(energy: f64) -> String {
        format!(
            r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<modeling>
 <calculation>
  <scstep>
   <energy>
    <i name="e_fr_energy">    -1.00000000 </i>
   </energy>
  </scstep>
  <structure>
   <crystal>
    <varray name="basis" >
     <v>       3.00000000       0.00000000       0.00000000 </v>
     <v>       0.00000000       3.00000000       0.00000000 </v>
     <v>       0.00000000       0.00000000       3.00000000 </v>
    </varray>
   </crystal>
   <varray name="positions" >
    <v>       0.00000000       0.00000000       0.00000000 </v>
    <v>       0.50000000       0.50000000       0.50000000 </v>
   </varray>
  </structure>
  <varray name="forces" >
   <v>       0.10000000       0.00000000       0.00000000 </v>
   <v>      -0.10000000       0.00000000       0.00000000 </v>
  </varray>
  <energy>
   <i name="e_fr_energy">    {energy:.8} </i>
  </energy>
 </calculation>
 <structure name="finalpos" >
  <crystal>
   <varray name="basis" >
    <v>       3.10000000       0.00000000       0.00000000 </v>
    <v>       0.00000000       3.10000000       0.00000000 </v>
    <v>       0.00000000       0.00000000       3.10000000 </v>
   </varray>
  </crystal>
  <varray name="positions" >
   <v>       0.01000000       0.00000000       0.00000000 </v>
   <v>       0.51000000       0.50000000       0.50000000 </v>
  </varray>
 </structure>
</modeling>
"#
        )
    }

    #[test]
    fn test_parse_final_structure() {
        let output = parse_vasprun_content(&sample_vasprun(-12.5), "vasprun.xml").unwrap();

        assert!(output.is_complete);
        assert_eq!(output.coord_mode, "direct");
        assert!((output.lattice[0][0] - 3.1).abs() < 1e-12);
        assert_eq!(output.basis.len(), 2);
        assert!((output.basis[1][0] - 0.51).abs() < 1e-12);
        assert!((output.forces[1][0] + 0.1).abs() < 1e-12);
        assert!((output.total_energy + 12.5).abs() < 1e-12);
    }

    #[test]
    fn test_truncated_file_is_incomplete() {
        let full = sample_vasprun(-3.0);
        let cut = full.replace("</modeling>", "");
        let output = parse_vasprun_content(&cut, "vasprun.xml").unwrap();
        assert!(!output.is_complete);
    }

    #[test]
    fn test_missing_forces() {
        let text = sample_vasprun(-3.0).replace(r#"<varray name="forces" >"#, "<varray>");
        assert!(parse_vasprun_content(&text, "vasprun.xml").is_err());
    }

    #[test]
    fn test_parses_are_independent() {
        // 多次解析共用同一组正则，结果互不影响
        let energies: Vec<f64> = [-1.5, -2.5, -1.5]
            .iter()
            .map(|e| {
                parse_vasprun_content(&sample_vasprun(*e), "vasprun.xml")
                    .unwrap()
                    .total_energy
            })
            .collect();
        assert_eq!(energies, vec![-1.5, -2.5, -1.5]);
    }
}
