//! # VASP 弛豫引擎
//!
//! 计算目录结构：
//! ```text
//! calctype.default/
//!   INCAR KPOINTS POSCAR POTCAR   # 由 setup 生成
//!   run.0/
//!   run.1/
//!   ...
//!   run.final/                    # 定体积计算 (ISIF=2, ISMEAR=-5, NSW=0, IBRION=-1)
//! ```
//! 状态完全由这些目录中的文件推导。`run_step` 连续运行 VASP，
//! 直到收敛或运行次数达到 run_limit。
//!
//! ## 依赖关系
//! - 被 `relax/controller.rs` 调用（通过 `EngineAdapter`）
//! - 使用 `parsers/`, `utils/progress.rs`

use crate::error::{RelaxError, Result};
use crate::models::calculation::final_dir;
use crate::models::{CalculationStatus, FinalOutput, RelaxSettings, Task};
use crate::parsers::incar::Incar;
use crate::parsers::poscar::parse_poscar_file;
use crate::parsers::{outcar, vasprun};
use crate::relax::input::apply_parallel_settings;
use crate::relax::settings::DEFAULT_RUN_LIMIT;
use crate::utils::{output, progress};

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// run.final 的 INCAR 覆盖
const FINAL_OVERRIDES: [(&str, &str); 4] =
    [("ISIF", "2"), ("ISMEAR", "-5"), ("NSW", "0"), ("IBRION", "-1")];

/// setup 生成的输入文件
const ENGINE_INPUTS: [&str; 4] = ["INCAR", "KPOINTS", "POSCAR", "POTCAR"];

/// 外部模拟引擎接口
pub trait EngineAdapter {
    /// 从磁盘文件推导当前状态
    fn status(&self) -> Result<CalculationStatus>;

    /// 执行一个工作单元，返回执行后的状态
    fn run_step(&mut self) -> Result<CalculationStatus>;

    /// 读取最终输出（内部原子顺序）
    fn read_final_output(&self) -> Result<FinalOutput>;

    /// 引擎使用的原子标签顺序
    fn internal_order(&self) -> Result<Vec<String>>;
}

/// VASP 弛豫
#[derive(Debug, Clone)]
pub struct VaspRelax {
    calcdir: PathBuf,
    /// 已解析的设置
    settings: RelaxSettings,
}

impl VaspRelax {
    pub fn new(calcdir: &Path, settings: RelaxSettings) -> Self {
        VaspRelax {
            calcdir: calcdir.to_path_buf(),
            settings,
        }
    }

    fn run_limit(&self) -> usize {
        self.settings.run_limit_value().unwrap_or(DEFAULT_RUN_LIMIT) as usize
    }

    /// 按编号排序的 run.N 目录
    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.calcdir).map_err(|e| RelaxError::FileReadError {
            path: self.calcdir.display().to_string(),
            source: e,
        })?;

        let mut runs: Vec<(usize, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let index = name.strip_prefix("run.")?.parse::<usize>().ok()?;
                Some((index, e.path()))
            })
            .collect();

        runs.sort_by_key(|(i, _)| *i);
        Ok(runs.into_iter().map(|(_, p)| p).collect())
    }

    /// VASP 命令；vasp_cmd 中的 {NCPUS} 会被替换
    fn vasp_command(&self) -> String {
        let ncpus = self.settings.ncpus_value();
        match (&self.settings.vasp_cmd, ncpus) {
            (Some(cmd), Some(n)) => cmd.replace("{NCPUS}", &n.to_string()),
            (Some(cmd), None) => cmd.clone(),
            (None, Some(n)) => format!("mpirun -np {} vasp_std", n),
            (None, None) => "vasp_std".to_string(),
        }
    }

    /// 继续弛豫：新建下一个 run.N
    fn relax_run(&self) -> Result<()> {
        let runs = self.run_dirs()?;
        let dir = self.calcdir.join(format!("run.{}", runs.len()));

        let (poscar, overrides) = match runs.last() {
            None => {
                let overrides = match &self.settings.initial {
                    Some(name) => vec![Incar::from_file(&self.calcdir.join(input_name(name)))?],
                    None => vec![],
                };
                (self.calcdir.join("POSCAR"), overrides)
            }
            Some(last) => (restart_structure(last), vec![]),
        };

        self.prepare_run_dir(&dir, &poscar, &overrides)?;
        self.execute(&dir)
    }

    /// 最终定体积计算
    fn final_run(&self) -> Result<()> {
        let runs = self.run_dirs()?;
        let poscar = match runs.last() {
            Some(last) => restart_structure(last),
            None => self.calcdir.join("POSCAR"),
        };

        let mut fixed = Incar::default();
        for (key, value) in FINAL_OVERRIDES {
            fixed.set(key, value);
        }
        let mut overrides = vec![fixed];
        if let Some(name) = &self.settings.final_incar {
            overrides.push(Incar::from_file(&self.calcdir.join(input_name(name)))?);
        }

        let dir = final_dir(&self.calcdir);
        self.prepare_run_dir(&dir, &poscar, &overrides)?;
        self.execute(&dir)
    }

    /// 复制输入文件到运行目录，并应用 INCAR 覆盖
    fn prepare_run_dir(&self, dir: &Path, poscar: &Path, overrides: &[Incar]) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| RelaxError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;

        let mut incar = Incar::from_file(&self.calcdir.join("INCAR"))?;
        for o in overrides {
            incar.update(o);
        }
        apply_parallel_settings(&mut incar, &self.settings);
        incar.write(&dir.join("INCAR"))?;

        copy_file(poscar, &dir.join("POSCAR"))?;
        for name in ["KPOINTS", "POTCAR"] {
            copy_file(&self.calcdir.join(name), &dir.join(name))?;
        }
        for name in self.settings.extra_input_files.iter().flatten() {
            let name = input_name(name);
            copy_file(&self.calcdir.join(&name), &dir.join(&name))?;
        }

        Ok(())
    }

    /// 在运行目录中执行 VASP
    fn execute(&self, dir: &Path) -> Result<()> {
        let command = self.vasp_command();
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let stdout_path = dir.join("stdout");
        let stdout = File::create(&stdout_path).map_err(|e| RelaxError::FileWriteError {
            path: stdout_path.display().to_string(),
            source: e,
        })?;

        let spinner = progress::create_spinner(&format!("{}: {}", dir_name, command));
        let result = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(dir)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .output();
        spinner.finish_and_clear();

        let out = result.map_err(|e| RelaxError::EngineFailed {
            command: command.clone(),
            dir: dir.display().to_string(),
            stderr: e.to_string(),
        })?;

        if !out.status.success() {
            return Err(RelaxError::EngineFailed {
                command,
                dir: dir.display().to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        output::print_info(&format!(
            "{} finished ({} ionic steps)",
            dir_name,
            outcar::ionic_steps(&dir.join("OSZICAR"))
        ));
        Ok(())
    }
}

impl EngineAdapter for VaspRelax {
    fn status(&self) -> Result<CalculationStatus> {
        let is_empty = match fs::read_dir(&self.calcdir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        };
        if is_empty {
            return Ok(CalculationStatus::NotStarted);
        }

        let final_run = final_dir(&self.calcdir);
        if final_run.is_dir() {
            return Ok(if outcar::is_finished(&final_run.join("OUTCAR")) {
                CalculationStatus::Converged
            } else {
                CalculationStatus::InProgress(Task::Constant)
            });
        }

        let runs = self.run_dirs()?;
        let last = match runs.last() {
            Some(last) => last,
            None => {
                let ready = ENGINE_INPUTS
                    .iter()
                    .all(|name| self.calcdir.join(name).is_file());
                return Ok(CalculationStatus::InProgress(if ready {
                    Task::Relax
                } else {
                    Task::Setup
                }));
            }
        };

        if runs.len() >= self.run_limit() {
            return Ok(CalculationStatus::Stalled);
        }

        if !outcar::is_finished(&last.join("OUTCAR")) {
            return Ok(CalculationStatus::InProgress(Task::Relax));
        }

        if !is_nonempty(&last.join("CONTCAR")) {
            return Ok(CalculationStatus::Unexpected {
                status: "incomplete".to_string(),
                task: format!(
                    "{} finished without CONTCAR",
                    last.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                ),
            });
        }

        // 至少两次弛豫且最后一次只走了一个离子步：结构已收敛
        if runs.len() >= 2 && outcar::ionic_steps(&last.join("OSZICAR")) <= 1 {
            return Ok(CalculationStatus::InProgress(Task::Constant));
        }

        Ok(CalculationStatus::InProgress(Task::Relax))
    }

    fn run_step(&mut self) -> Result<CalculationStatus> {
        let mut final_attempted = false;

        loop {
            match self.status()? {
                CalculationStatus::InProgress(Task::Relax) => self.relax_run()?,
                CalculationStatus::InProgress(Task::Constant) => {
                    // 定体积计算失败不会自行恢复
                    if final_attempted {
                        return Ok(CalculationStatus::Unexpected {
                            status: "incomplete".to_string(),
                            task: "constant volume run did not finish".to_string(),
                        });
                    }
                    final_attempted = true;
                    self.final_run()?;
                }
                other => return Ok(other),
            }
        }
    }

    fn read_final_output(&self) -> Result<FinalOutput> {
        vasprun::parse_vasprun_file(&final_dir(&self.calcdir).join("vasprun.xml"))
    }

    fn internal_order(&self) -> Result<Vec<String>> {
        Ok(parse_poscar_file(&self.calcdir.join("POSCAR"))?.labels())
    }
}

/// 下一次运行的起始结构：上一次的 CONTCAR，为空时退回 POSCAR
fn restart_structure(run: &Path) -> PathBuf {
    let contcar = run.join("CONTCAR");
    if is_nonempty(&contcar) {
        contcar
    } else {
        run.join("POSCAR")
    }
}

/// 设置中的文件名只取最后一段
fn input_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string())
}

fn is_nonempty(path: &Path) -> bool {
    path.metadata().map(|m| m.len() > 0).unwrap_or(false)
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest)
        .map(|_| ())
        .map_err(|e| RelaxError::FileWriteError {
            path: dest.display().to_string(),
            source: e,
        })
}
