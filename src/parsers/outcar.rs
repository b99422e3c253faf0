//! # VASP 运行输出检查
//!
//! 判断单次 VASP 运行是否正常结束（OUTCAR 结尾的计时信息），
//! 以及该运行走了多少个离子步（OSZICAR 中的 `F=` 行）。
//!
//! ## 依赖关系
//! - 被 `relax/engine.rs` 使用

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const FINISHED_MARKER: &str = "General timing and accounting informations for this job";

/// OUTCAR 是否包含正常结束标记；文件不存在时返回 false
pub fn is_finished(outcar: &Path) -> bool {
    let file = match File::open(outcar) {
        Ok(f) => f,
        Err(_) => return false,
    };

    BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .any(|line| line.contains(FINISHED_MARKER))
}

/// OSZICAR 中的离子步数；文件不存在时返回 0
pub fn ionic_steps(oszicar: &Path) -> usize {
    let file = match File::open(oszicar) {
        Ok(f) => f,
        Err(_) => return 0,
    };

    // 离子步行形如 "   1 F= -.12345678E+02 E0= ..."
    BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .filter(|line| line.contains(" F="))
        .count()
}
