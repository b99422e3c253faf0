//! # VASP INCAR 解析器
//!
//! INCAR 按 `TAG = value` 读写。注释（`#` 或 `!` 之后）会被丢弃，
//! 一行中以 `;` 分隔的多个标签会被拆开。标签名统一为大写。
//!
//! ## 依赖关系
//! - 被 `relax/input.rs`, `relax/engine.rs` 使用

use crate::error::{RelaxError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// INCAR 标签集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Incar {
    tags: BTreeMap<String, String>,
}

impl Incar {
    /// 读取 INCAR 文件
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// 从字符串解析
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let mut tags = BTreeMap::new();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.split(['#', '!']).next().unwrap_or("");
            for statement in line.split(';') {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                let (key, value) =
                    statement
                        .split_once('=')
                        .ok_or_else(|| RelaxError::ParseError {
                            format: "incar".to_string(),
                            path: source.to_string(),
                            reason: format!("Expected 'TAG = value' at line {}", lineno + 1),
                        })?;
                tags.insert(key.trim().to_uppercase(), value.trim().to_string());
            }
        }

        Ok(Incar { tags })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(&key.to_uppercase()).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.tags.insert(key.to_uppercase(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.tags.remove(&key.to_uppercase())
    }

    /// 用另一个 INCAR 的标签覆盖当前标签
    pub fn update(&mut self, other: &Incar) {
        for (key, value) in &other.tags {
            self.tags.insert(key.clone(), value.clone());
        }
    }

    /// 设置或移除一个可选的整数标签
    pub fn set_optional(&mut self, key: &str, value: Option<u32>) {
        match value {
            Some(v) => self.set(key, v.to_string()),
            None => {
                self.remove(key);
            }
        }
    }

    /// 写出 INCAR 文本
    pub fn to_incar_string(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{} = {}\n", k, v))
            .collect()
    }

    /// 写出到文件
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_incar_string()).map_err(|e| RelaxError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// 将逐原子取值压缩成 VASP 的 `n*value` 形式
pub fn compress_values(values: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut iter = values.iter().peekable();

    while let Some(value) = iter.next() {
        let mut count = 1;
        while iter.peek() == Some(&value) {
            iter.next();
            count += 1;
        }
        if count == 1 {
            parts.push(value.clone());
        } else {
            parts.push(format!("{}*{}", count, value));
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_incar_with_comments() {
        let content = "SYSTEM = test  # comment\nencut=520\n! full comment\nISMEAR = 0; SIGMA = 0.05\n";
        let incar = Incar::parse(content, "INCAR").unwrap();

        assert_eq!(incar.get("ENCUT"), Some("520"));
        assert_eq!(incar.get("system"), Some("test"));
        assert_eq!(incar.get("SIGMA"), Some("0.05"));
        assert_eq!(incar.get("ISMEAR"), Some("0"));
    }

    #[test]
    fn test_parse_incar_rejects_garbage() {
        assert!(Incar::parse("ENCUT 520\n", "INCAR").is_err());
    }

    #[test]
    fn test_set_optional_removes_tag() {
        let mut incar = Incar::parse("NPAR = 4\n", "INCAR").unwrap();
        incar.set_optional("NPAR", None);
        incar.set_optional("NCORE", Some(8));

        assert_eq!(incar.get("NPAR"), None);
        assert_eq!(incar.to_incar_string(), "NCORE = 8\n");
    }

    #[test]
    fn test_compress_values() {
        let values: Vec<String> = ["1.0", "1.0", "0.0", "1.0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(compress_values(&values), "2*1.0 0.0 1.0");
    }
}
