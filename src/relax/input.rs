//! # VASP 输入文件生成
//!
//! 首次运行前在计算目录中写出 INCAR、KPOINTS、POSCAR、POTCAR
//! 以及额外输入文件。所有必需文件先全部检查，缺任何一个都会在
//! 写出任何文件之前报配置错误。
//!
//! 原胞 POSCAR 只在 KPOINTS 不是完全自动模式时才需要，
//! 用于把原胞上的 k 点网格缩放到超胞上。
//!
//! ## 依赖关系
//! - 被 `relax/controller.rs` 调用（通过 `InputWriter`）
//! - 使用 `parsers/`, `project.rs`

use crate::error::{RelaxError, Result};
use crate::models::{CalculationUnit, RelaxSettings};
use crate::parsers::incar::{compress_values, Incar};
use crate::parsers::kpoints::Kpoints;
use crate::parsers::poscar::{parse_poscar_file, to_poscar_string};
use crate::parsers::species::SpeciesSettings;
use crate::project::Project;
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 首次运行前的输入准备
pub trait InputWriter {
    fn write_inputs(&self, unit: &CalculationUnit, settings: &RelaxSettings) -> Result<()>;
}

/// 在 INCAR 中设置（或移除）并行参数
pub fn apply_parallel_settings(incar: &mut Incar, settings: &RelaxSettings) {
    incar.set_optional("NPAR", settings.npar_value());
    incar.set_optional("NCORE", settings.ncore_value());
    incar.set_optional("KPAR", settings.kpar_value());
}

/// 已定位的输入文件
#[derive(Debug)]
struct InputFiles {
    incar: PathBuf,
    kpoints: PathBuf,
    prim_poscar: Option<PathBuf>,
    pos: PathBuf,
    species: PathBuf,
    extra: Vec<PathBuf>,
}

/// 从项目设置目录生成 VASP 输入
pub struct VaspInputWriter {
    project: Project,
}

impl VaspInputWriter {
    pub fn new(project: Project) -> Self {
        VaspInputWriter { project }
    }

    /// 查找并检查所有输入文件
    fn locate(&self, unit: &CalculationUnit, settings: &RelaxSettings) -> Result<InputFiles> {
        let configdir = &unit.configdir;

        let incar = self.project.require_settings_path(configdir, "INCAR")?;
        let kpoints = self.project.require_settings_path(configdir, "KPOINTS")?;
        let species = self.project.require_settings_path(configdir, "SPECIES")?;

        let pos = unit.pos_file();
        if !pos.is_file() {
            return Err(RelaxError::FileNotFound {
                path: pos.display().to_string(),
            });
        }

        let extra = settings
            .input_file_names()
            .iter()
            .map(|name| self.project.require_settings_path(configdir, name))
            .collect::<Result<Vec<_>>>()?;

        // 原胞 POSCAR 仅在非自动 KPOINTS 时必需
        let mode = Kpoints::from_file(&kpoints)?;
        let prim_poscar = self.project.settings_path(configdir, "POSCAR");
        if prim_poscar.is_none() && !mode.is_automatic() {
            return Err(RelaxError::Configuration(format!(
                "KPOINTS mode '{}' is scaled from the prim lattice and needs .../settings/{}/POSCAR",
                mode.mode, self.project.calctype
            )));
        }

        Ok(InputFiles {
            incar,
            kpoints,
            prim_poscar,
            pos,
            species,
            extra,
        })
    }
}

impl InputWriter for VaspInputWriter {
    fn write_inputs(&self, unit: &CalculationUnit, settings: &RelaxSettings) -> Result<()> {
        output::print_info("Writing VASP input files");
        let files = self.locate(unit, settings)?;

        let pos = parse_poscar_file(&files.pos)?;
        let structure = if unit.sort {
            pos.sorted_by_label()
        } else {
            pos
        };
        let species = SpeciesSettings::from_file(&files.species)?;

        // INCAR: 模板 + 逐原子物种标签 + 并行参数
        let mut incar = Incar::from_file(&files.incar)?;
        for tag in &species.tag_names {
            let values = structure
                .atoms
                .iter()
                .map(|atom| -> Result<String> {
                    let entry = species.get(&atom.element)?;
                    Ok(entry.tags.get(tag).cloned().unwrap_or_default())
                })
                .collect::<Result<Vec<String>>>()?;
            incar.set(tag, compress_values(&values));
        }
        apply_parallel_settings(&mut incar, settings);

        // KPOINTS
        let kpoints = Kpoints::from_file(&files.kpoints)?;
        let kpoints = match &files.prim_poscar {
            Some(prim) if !kpoints.is_automatic() => {
                let prim = parse_poscar_file(prim)?;
                kpoints.scaled_to(&prim.lattice, &structure.lattice)
            }
            _ => kpoints,
        };

        // POTCAR: 按 POSCAR 中的物种块拼接
        let mut potcar = String::new();
        for (label, _) in structure.species_blocks() {
            let entry = species.get(&label)?;
            if !entry.write_potcar {
                continue;
            }
            let path = species.potcar_path(entry);
            let text = fs::read_to_string(&path).map_err(|_| RelaxError::FileNotFound {
                path: path.display().to_string(),
            })?;
            potcar.push_str(&text);
        }

        let calcdir = &unit.calcdir;
        fs::create_dir_all(calcdir).map_err(|e| RelaxError::FileWriteError {
            path: calcdir.display().to_string(),
            source: e,
        })?;

        incar.write(&calcdir.join("INCAR"))?;
        write_file(&calcdir.join("KPOINTS"), &kpoints.to_kpoints_string())?;
        write_file(&calcdir.join("POSCAR"), &to_poscar_string(&structure))?;
        write_file(&calcdir.join("POTCAR"), &potcar)?;

        for src in &files.extra {
            let name = src.file_name().ok_or_else(|| {
                RelaxError::Configuration(format!("Invalid input file name: {}", src.display()))
            })?;
            let dest = calcdir.join(name);
            fs::copy(src, &dest).map_err(|e| RelaxError::FileWriteError {
                path: dest.display().to_string(),
                source: e,
            })?;
        }

        output::print_success(&format!("Input files written to {}", calcdir.display()));
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| RelaxError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
