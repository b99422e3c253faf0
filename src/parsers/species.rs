//! # SPECIES 设置文件解析器
//!
//! ```text
//! POTCAR_DIR_PATH = /path/to/potcars
//! SPECIES  ALIAS  POTCAR  POTCAR_location  MAGMOM
//! Ni       Ni     1       PAW_PBE/Ni       1.0
//! Al       Al     1       PAW_PBE/Al       0.0
//! ```
//! 第四列之后的列都是逐原子的 INCAR 标签。
//!
//! ## 依赖关系
//! - 被 `relax/input.rs` 使用

use crate::error::{RelaxError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 单个物种的设置
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesEntry {
    pub alias: String,
    pub write_potcar: bool,
    pub potcar_location: String,
    /// 逐原子 INCAR 标签，例如 MAGMOM
    pub tags: BTreeMap<String, String>,
}

/// SPECIES 文件内容
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesSettings {
    pub potcar_dir: PathBuf,
    pub tag_names: Vec<String>,
    pub species: BTreeMap<String, SpeciesEntry>,
}

impl SpeciesSettings {
    /// 读取 SPECIES 文件
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// 从字符串解析
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let parse_error = |reason: String| RelaxError::ParseError {
            format: "species".to_string(),
            path: source.to_string(),
            reason,
        };

        let mut lines = content.lines().filter(|l| !l.trim().is_empty());

        let first = lines
            .next()
            .ok_or_else(|| parse_error("Empty file".to_string()))?;
        let (key, value) = first
            .split_once('=')
            .ok_or_else(|| parse_error("Expected 'POTCAR_DIR_PATH = <dir>'".to_string()))?;
        if key.trim() != "POTCAR_DIR_PATH" {
            return Err(parse_error(format!(
                "Expected POTCAR_DIR_PATH, found '{}'",
                key.trim()
            )));
        }
        let potcar_dir = PathBuf::from(value.trim());

        let header: Vec<String> = lines
            .next()
            .ok_or_else(|| parse_error("Missing header line".to_string()))?
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        if header.len() < 4 {
            return Err(parse_error(
                "Header needs SPECIES ALIAS POTCAR POTCAR_location".to_string(),
            ));
        }
        let tag_names: Vec<String> = header[4..].iter().map(|s| s.to_uppercase()).collect();

        let mut species = BTreeMap::new();
        for line in lines {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() != header.len() {
                return Err(parse_error(format!(
                    "Row '{}' has {} columns, header has {}",
                    line.trim(),
                    cols.len(),
                    header.len()
                )));
            }

            let write_potcar = match cols[2] {
                "1" => true,
                "0" => false,
                other => {
                    return Err(parse_error(format!("POTCAR flag must be 0 or 1, got '{}'", other)))
                }
            };

            let tags = tag_names
                .iter()
                .cloned()
                .zip(cols[4..].iter().map(|s| s.to_string()))
                .collect();

            species.insert(
                cols[0].to_string(),
                SpeciesEntry {
                    alias: cols[1].to_string(),
                    write_potcar,
                    potcar_location: cols[3].to_string(),
                    tags,
                },
            );
        }

        Ok(SpeciesSettings {
            potcar_dir,
            tag_names,
            species,
        })
    }

    /// 查找物种，不存在时报配置错误
    pub fn get(&self, name: &str) -> Result<&SpeciesEntry> {
        self.species.get(name).ok_or_else(|| {
            RelaxError::Configuration(format!("Species '{}' is not listed in SPECIES", name))
        })
    }

    /// POTCAR 文件路径
    pub fn potcar_path(&self, entry: &SpeciesEntry) -> PathBuf {
        self.potcar_dir.join(&entry.potcar_location).join("POTCAR")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECIES: &str = "POTCAR_DIR_PATH = /opt/potcars
SPECIES  ALIAS  POTCAR  POTCAR_location  MAGMOM
Ni       Ni     1       PAW_PBE/Ni       1.0
Va       Va     0       -                0.0
";

    #[test]
    fn test_parse_species() {
        let settings = SpeciesSettings::parse(SPECIES, "SPECIES").unwrap();

        assert_eq!(settings.potcar_dir, PathBuf::from("/opt/potcars"));
        assert_eq!(settings.tag_names, vec!["MAGMOM".to_string()]);

        let ni = settings.get("Ni").unwrap();
        assert!(ni.write_potcar);
        assert_eq!(ni.tags.get("MAGMOM").map(|s| s.as_str()), Some("1.0"));
        assert_eq!(
            settings.potcar_path(ni),
            PathBuf::from("/opt/potcars/PAW_PBE/Ni/POTCAR")
        );
        assert!(!settings.get("Va").unwrap().write_potcar);
    }

    #[test]
    fn test_unknown_species_is_configuration_error() {
        let settings = SpeciesSettings::parse(SPECIES, "SPECIES").unwrap();
        assert!(matches!(
            settings.get("Al"),
            Err(RelaxError::Configuration(_))
        ));
    }

    #[test]
    fn test_row_column_mismatch() {
        let bad = "POTCAR_DIR_PATH = /p\nSPECIES ALIAS POTCAR POTCAR_location\nNi Ni 1\n";
        assert!(SpeciesSettings::parse(bad, "SPECIES").is_err());
    }
}
