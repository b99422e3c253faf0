//! # 结果记录
//!
//! 把引擎最终输出（内部原子顺序）转换为 `ResultsRecord`（外部原子顺序），
//! 并合并写入 properties.calc.json。已有文件中的其他键保留，
//! 新字段覆盖旧值。输出键按字母序排列，重复写出的内容完全相同。
//!
//! ## 依赖关系
//! - 被 `relax/controller.rs` 调用
//! - 使用 `relax/remap.rs`, `serde_json`

use crate::error::{RelaxError, Result};
use crate::models::{Crystal, FinalOutput, ResultsRecord};
use crate::relax::remap::IndexRemapper;

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// 由最终输出构造结果记录
///
/// `pos` 是外部顺序的结构，物种统计按其首次出现顺序。
pub fn build_record(
    output: &FinalOutput,
    pos: &Crystal,
    remapper: &IndexRemapper,
) -> Result<ResultsRecord> {
    if remapper.len() != pos.atoms.len() {
        return Err(RelaxError::InconsistentOrdering(format!(
            "engine reports {} atoms, POS has {}",
            remapper.len(),
            pos.atoms.len()
        )));
    }

    let (atom_type, atoms_per_type) = pos.species_counts();

    Ok(ResultsRecord {
        is_complete: output.is_complete,
        atom_type,
        atoms_per_type,
        coord_mode: output.coord_mode.clone(),
        relaxed_forces: remapper.scatter(&output.forces)?,
        relaxed_basis: remapper.scatter(&output.basis)?,
        relaxed_lattice: output.lattice,
        relaxed_energy: output.total_energy,
    })
}

/// 合并写入结果文件
pub fn write_merged(path: &Path, record: &ResultsRecord) -> Result<()> {
    let json_error = |e: serde_json::Error| RelaxError::Json {
        path: path.display().to_string(),
        source: e,
    };

    let mut merged = if path.is_file() {
        let text = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        match serde_json::from_str::<Value>(&text).map_err(json_error)? {
            Value::Object(map) => map,
            _ => {
                return Err(RelaxError::ParseError {
                    format: "JSON".to_string(),
                    path: path.display().to_string(),
                    reason: "results file is not a JSON object".to_string(),
                })
            }
        }
    } else {
        Map::new()
    };

    if let Value::Object(fields) = serde_json::to_value(record).map_err(json_error)? {
        merged.extend(fields);
    }

    let text = serde_json::to_string_pretty(&Value::Object(merged)).map_err(json_error)?;
    fs::write(path, text + "\n").map_err(|e| RelaxError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn pos() -> Crystal {
        let lattice = Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]);
        Crystal::new(
            "pos",
            lattice,
            vec![
                Atom::new("A", [0.0, 0.0, 0.0]),
                Atom::new("A", [0.5, 0.0, 0.0]),
                Atom::new("B", [0.5, 0.5, 0.5]),
            ],
        )
    }

    fn output() -> FinalOutput {
        FinalOutput {
            is_complete: true,
            coord_mode: "direct".to_string(),
            lattice: [[3.1, 0.0, 0.0], [0.0, 3.1, 0.0], [0.0, 0.0, 3.1]],
            basis: vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [0.5, 0.0, 0.0]],
            forces: vec![[0.1, 0.0, 0.0], [0.2, 0.0, 0.0], [0.3, 0.0, 0.0]],
            total_energy: -12.5,
        }
    }

    #[test]
    fn test_record_in_external_order() {
        let remapper = IndexRemapper::from_orders(&["A", "B", "A"], &["A", "A", "B"]).unwrap();
        let record = build_record(&output(), &pos(), &remapper).unwrap();

        assert_eq!(record.atom_type, vec!["A", "B"]);
        assert_eq!(record.atoms_per_type, vec![2, 1]);
        assert_eq!(
            record.relaxed_forces,
            vec![[0.1, 0.0, 0.0], [0.3, 0.0, 0.0], [0.2, 0.0, 0.0]]
        );
        assert_eq!(record.relaxed_basis[2], [0.5, 0.5, 0.5]);
        assert_eq!(record.relaxed_energy, -12.5);
    }

    #[test]
    fn test_atom_count_mismatch() {
        let remapper = IndexRemapper::identity(2);
        assert!(matches!(
            build_record(&output(), &pos(), &remapper),
            Err(RelaxError::InconsistentOrdering(_))
        ));
    }

    #[test]
    fn test_merge_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.calc.json");
        fs::write(&path, r#"{"note": "keep", "relaxed_energy": 0.0}"#).unwrap();

        let record = build_record(&output(), &pos(), &IndexRemapper::identity(3)).unwrap();
        write_merged(&path, &record).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["note"], "keep");
        assert_eq!(value["relaxed_energy"], -12.5);
        assert_eq!(value["is_complete"], true);
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.calc.json");
        let record = build_record(&output(), &pos(), &IndexRemapper::identity(3)).unwrap();

        write_merged(&path, &record).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        write_merged(&path, &record).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }
}
