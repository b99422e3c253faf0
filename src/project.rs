//! # 项目目录布局
//!
//! 项目根目录是最近的包含 `.casm` 目录的祖先目录。
//! 设置文件按“就近优先”查找：从构型目录开始逐级向上，
//! 检查每一级的 `settings/<calctype>/<name>`，直到项目根目录。
//!
//! ```text
//! root/
//!   .casm/project_settings.json      # curr_calctype
//!   settings/calctype.default/       # INCAR KPOINTS POSCAR SPECIES relax.json
//!   training_data/SCEL4_1_2_2/0/
//!     POS
//!     settings/calctype.default/     # 构型本地设置（快照写在这里）
//!     calctype.default/              # 计算目录
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/settings.rs`, `models/calculation.rs`

use crate::error::{RelaxError, Result};
use crate::models::{CalculationUnit, RelaxSettings};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CALCTYPE: &str = "calctype.default";

#[derive(Debug, Deserialize)]
struct ProjectSettings {
    #[serde(default)]
    curr_calctype: Option<String>,
}

/// 项目布局
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub calctype: String,
}

impl Project {
    /// 从任意子目录定位项目
    pub fn locate(start: &Path) -> Result<Self> {
        let root = start
            .ancestors()
            .find(|dir| dir.join(".casm").is_dir())
            .ok_or_else(|| {
                RelaxError::Configuration(format!(
                    "Not in a project: no '.casm' directory above {}",
                    start.display()
                ))
            })?
            .to_path_buf();

        let settings_file = root.join(".casm").join("project_settings.json");
        let calctype = if settings_file.is_file() {
            let text = fs::read_to_string(&settings_file).map_err(|e| RelaxError::FileReadError {
                path: settings_file.display().to_string(),
                source: e,
            })?;
            let settings: ProjectSettings =
                serde_json::from_str(&text).map_err(|e| RelaxError::Json {
                    path: settings_file.display().to_string(),
                    source: e,
                })?;
            settings.curr_calctype
        } else {
            None
        };

        Ok(Project {
            root,
            calctype: calctype.unwrap_or_else(|| DEFAULT_CALCTYPE.to_string()),
        })
    }

    /// 就近查找设置文件
    pub fn settings_path(&self, configdir: &Path, name: &str) -> Option<PathBuf> {
        configdir
            .ancestors()
            .take_while(|dir| dir.starts_with(&self.root))
            .map(|dir| dir.join("settings").join(&self.calctype).join(name))
            .find(|candidate| candidate.is_file())
    }

    /// 查找必需的设置文件，找不到时报配置错误
    pub fn require_settings_path(&self, configdir: &Path, name: &str) -> Result<PathBuf> {
        self.settings_path(configdir, name)
            .ok_or_else(|| RelaxError::FileNotFound {
                path: format!(".../settings/{}/{}", self.calctype, name),
            })
    }

    /// 作业名：构型相对 training_data 的路径，'/' 替换为 '.'
    pub fn jobname(&self, configdir: &Path) -> String {
        let base = self.root.join("training_data");
        let relative = configdir
            .strip_prefix(&base)
            .or_else(|_| configdir.strip_prefix(&self.root))
            .unwrap_or(configdir);

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(".");

        if name.is_empty() {
            "relax".to_string()
        } else {
            name
        }
    }

    /// 构造一个计算单元：读取 relax.json 并创建计算目录
    pub fn calculation_unit(&self, configdir: &Path, sort: bool) -> Result<CalculationUnit> {
        if !configdir.is_dir() {
            return Err(RelaxError::DirectoryNotFound {
                path: configdir.display().to_string(),
            });
        }

        let settings_file = self.require_settings_path(configdir, "relax.json")?;
        let settings = read_settings(&settings_file)?;

        let calcdir = configdir.join(&self.calctype);
        fs::create_dir_all(&calcdir).map_err(|e| RelaxError::FileWriteError {
            path: calcdir.display().to_string(),
            source: e,
        })?;

        Ok(CalculationUnit {
            configdir: configdir.to_path_buf(),
            calcdir,
            settings,
            snapshot_file: configdir
                .join("settings")
                .join(&self.calctype)
                .join("relax.json"),
            jobname: self.jobname(configdir),
            sort,
        })
    }
}

/// 读取 relax.json
pub fn read_settings(path: &Path) -> Result<RelaxSettings> {
    let text = fs::read_to_string(path).map_err(|e| RelaxError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| RelaxError::Json {
        path: path.display().to_string(),
        source: e,
    })
}

/// 写出 relax.json（键按字母序排列）
pub fn write_settings(settings: &RelaxSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RelaxError::FileWriteError {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    // 先转成 Value，serde_json 的 Map 按键排序
    let value = serde_json::to_value(settings).map_err(|e| RelaxError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    let text = serde_json::to_string_pretty(&value).map_err(|e| RelaxError::Json {
        path: path.display().to_string(),
        source: e,
    })?;

    fs::write(path, text + "\n").map_err(|e| RelaxError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 在临时目录中建立一个最小项目，返回 (项目, 构型目录)
    pub(crate) fn scratch_project(root: &Path, relax_json: &str) -> (Project, PathBuf) {
        fs::create_dir_all(root.join(".casm")).unwrap();
        fs::write(
            root.join(".casm/project_settings.json"),
            r#"{"curr_calctype": "calctype.default"}"#,
        )
        .unwrap();

        let settings_dir = root.join("settings/calctype.default");
        fs::create_dir_all(&settings_dir).unwrap();
        fs::write(settings_dir.join("relax.json"), relax_json).unwrap();

        let configdir = root.join("training_data/SCEL2_1_2_1/0");
        fs::create_dir_all(&configdir).unwrap();

        (Project::locate(&configdir).unwrap(), configdir)
    }

    #[test]
    fn test_locate_reads_calctype() {
        let dir = tempfile::tempdir().unwrap();
        let (project, _) = scratch_project(dir.path(), "{}");

        assert_eq!(project.root, dir.path());
        assert_eq!(project.calctype, "calctype.default");
    }

    #[test]
    fn test_locate_outside_project() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Project::locate(dir.path()),
            Err(RelaxError::Configuration(_))
        ));
    }

    #[test]
    fn test_nearest_settings_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let (project, configdir) = scratch_project(dir.path(), r#"{"run_limit": 10}"#);

        let local = configdir.join("settings/calctype.default");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("relax.json"), r#"{"run_limit": 20}"#).unwrap();

        let found = project.settings_path(&configdir, "relax.json").unwrap();
        assert_eq!(found, local.join("relax.json"));

        let global = project.settings_path(&configdir.join("sub"), "INCAR");
        assert!(global.is_none());
    }

    #[test]
    fn test_jobname_relative_to_training_data() {
        let dir = tempfile::tempdir().unwrap();
        let (project, configdir) = scratch_project(dir.path(), "{}");
        assert_eq!(project.jobname(&configdir), "SCEL2_1_2_1.0");
    }

    #[test]
    fn test_calculation_unit_paths() {
        let dir = tempfile::tempdir().unwrap();
        let (project, configdir) = scratch_project(dir.path(), r#"{"ppn": 16}"#);

        let unit = project.calculation_unit(&configdir, true).unwrap();
        assert!(unit.calcdir.is_dir());
        assert_eq!(unit.settings.ppn, Some(16));
        assert_eq!(
            unit.snapshot_file,
            configdir.join("settings/calctype.default/relax.json")
        );
        assert_eq!(unit.results_file(), unit.calcdir.join("properties.calc.json"));
    }

    #[test]
    fn test_missing_relax_json() {
        let dir = tempfile::tempdir().unwrap();
        let (project, configdir) = scratch_project(dir.path(), "{}");
        fs::remove_file(dir.path().join("settings/calctype.default/relax.json")).unwrap();

        assert!(matches!(
            project.calculation_unit(&configdir, true),
            Err(RelaxError::FileNotFound { .. })
        ));
    }
}
