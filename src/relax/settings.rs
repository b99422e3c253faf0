//! # 运行时设置解析
//!
//! 将 relax.json 中的占位符替换为运行环境中的具体值，得到不含占位符的设置：
//! - `npar`: derive -> 节点数或 None；engine-default -> None
//! - `ncore`: 仅当 `npar` 为 None 时解析，derive -> 每节点核数或 None，
//!   engine-default -> 1；`npar` 有值时强制为 None
//! - `kpar`: 数值保留，占位符 -> None
//! - `ncpus`: 缺省或 derive -> 总核数或 None
//! - `run_limit`: 缺省或占位符 -> 10
//!
//! ## 依赖关系
//! - 被 `relax/controller.rs`, `commands/` 使用
//! - 使用 `models/settings.rs`

use crate::models::{RelaxSettings, Sentinel, Setting};

/// run_limit 缺省值
pub const DEFAULT_RUN_LIMIT: u32 = 10;

/// engine-default 对应的 NCORE
const ENGINE_DEFAULT_NCORE: u32 = 1;

/// 调度器提供的运行环境
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Environment {
    /// 节点数
    pub nodes: Option<u32>,
    /// 每节点处理器数
    pub procs_per_node: Option<u32>,
    /// 总处理器数
    pub total_procs: Option<u32>,
}

impl Environment {
    /// 从当前进程环境变量读取（Slurm 优先，兼容 PBS）
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| -> Option<u32> {
            keys.iter()
                .filter_map(|k| lookup(k))
                // SLURM_NTASKS_PER_NODE 可能是 "16(x2)" 形式
                .filter_map(|v| {
                    v.split(|c: char| !c.is_ascii_digit())
                        .next()
                        .and_then(|n| n.parse().ok())
                })
                .next()
        };

        Environment {
            nodes: first(&["SLURM_JOB_NUM_NODES", "PBS_NUM_NODES"]),
            procs_per_node: first(&["SLURM_NTASKS_PER_NODE", "PBS_NUM_PPN"]),
            total_procs: first(&["SLURM_NTASKS", "PBS_NP"]),
        }
    }
}

/// 解析设置中的所有占位符
pub fn resolve(stored: &RelaxSettings, env: &Environment) -> RelaxSettings {
    let mut settings = stored.clone();

    settings.npar = match stored.npar {
        Some(Setting::Sentinel(Sentinel::DeriveFromEnvironment)) => env.nodes.map(Setting::Value),
        Some(Setting::Sentinel(Sentinel::EngineDefault)) => None,
        other => other,
    };

    settings.ncore = if settings.npar.is_none() {
        match stored.ncore {
            Some(Setting::Sentinel(Sentinel::DeriveFromEnvironment)) => {
                env.procs_per_node.map(Setting::Value)
            }
            Some(Setting::Sentinel(Sentinel::EngineDefault)) => {
                Some(Setting::Value(ENGINE_DEFAULT_NCORE))
            }
            other => other,
        }
    } else {
        None
    };

    settings.kpar = stored.kpar.and_then(|s| s.value()).map(Setting::Value);

    settings.ncpus = match stored.ncpus {
        None | Some(Setting::Sentinel(_)) => env.total_procs.map(Setting::Value),
        other => other,
    };

    settings.run_limit = Some(Setting::Value(
        stored
            .run_limit
            .and_then(|s| s.value())
            .unwrap_or(DEFAULT_RUN_LIMIT),
    ));

    settings
}

/// 未收敛时写出的本地设置快照
///
/// 保留原始占位符（下次运行时按新环境重新解析），
/// run_limit 取本次运行实际使用的值，方便手动调大后继续。
pub fn snapshot(stored: &RelaxSettings, resolved: &RelaxSettings) -> RelaxSettings {
    RelaxSettings {
        run_limit: resolved.run_limit,
        ..stored.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive() -> Option<Setting> {
        Some(Setting::Sentinel(Sentinel::DeriveFromEnvironment))
    }

    fn engine_default() -> Option<Setting> {
        Some(Setting::Sentinel(Sentinel::EngineDefault))
    }

    #[test]
    fn test_npar_from_environment_clears_ncore() {
        let stored = RelaxSettings {
            npar: derive(),
            ncore: Some(Setting::Value(8)),
            ..Default::default()
        };
        let env = Environment {
            nodes: Some(4),
            ..Default::default()
        };

        let resolved = resolve(&stored, &env);
        assert_eq!(resolved.npar_value(), Some(4));
        assert_eq!(resolved.ncore, None);
    }

    #[test]
    fn test_npar_absent_lets_ncore_resolve() {
        let stored = RelaxSettings {
            npar: derive(),
            ncore: derive(),
            ..Default::default()
        };
        let env = Environment {
            procs_per_node: Some(16),
            ..Default::default()
        };

        let resolved = resolve(&stored, &env);
        assert_eq!(resolved.npar, None);
        assert_eq!(resolved.ncore_value(), Some(16));

        let stored = RelaxSettings {
            npar: derive(),
            ncore: engine_default(),
            ..Default::default()
        };
        let resolved = resolve(&stored, &Environment::default());
        assert_eq!(resolved.npar, None);
        assert_eq!(resolved.ncore_value(), Some(1));
    }

    #[test]
    fn test_engine_default_npar() {
        let stored = RelaxSettings {
            npar: engine_default(),
            ncore: derive(),
            ..Default::default()
        };
        let resolved = resolve(&stored, &Environment::default());
        assert_eq!(resolved.npar, None);
        assert_eq!(resolved.ncore, None);
    }

    #[test]
    fn test_run_limit_and_ncpus_defaults() {
        let env = Environment {
            total_procs: Some(64),
            ..Default::default()
        };
        let resolved = resolve(&RelaxSettings::default(), &env);
        assert_eq!(resolved.run_limit_value(), Some(DEFAULT_RUN_LIMIT));
        assert_eq!(resolved.ncpus_value(), Some(64));

        let stored = RelaxSettings {
            run_limit: Some(Setting::Value(3)),
            ncpus: Some(Setting::Value(8)),
            kpar: derive(),
            ..Default::default()
        };
        let resolved = resolve(&stored, &env);
        assert_eq!(resolved.run_limit_value(), Some(3));
        assert_eq!(resolved.ncpus_value(), Some(8));
        assert_eq!(resolved.kpar, None);
    }

    #[test]
    fn test_environment_lookup() {
        let env = Environment::from_lookup(|key| match key {
            "PBS_NUM_NODES" => Some("2".to_string()),
            "SLURM_NTASKS_PER_NODE" => Some("16(x2)".to_string()),
            "SLURM_NTASKS" => Some("32".to_string()),
            _ => None,
        });
        assert_eq!(env.nodes, Some(2));
        assert_eq!(env.procs_per_node, Some(16));
        assert_eq!(env.total_procs, Some(32));
    }

    #[test]
    fn test_snapshot_keeps_sentinels() {
        let stored = RelaxSettings {
            npar: derive(),
            ..Default::default()
        };
        let resolved = resolve(&stored, &Environment::default());
        let snap = snapshot(&stored, &resolved);

        assert_eq!(snap.npar, derive());
        assert_eq!(snap.run_limit_value(), Some(DEFAULT_RUN_LIMIT));
    }
}
