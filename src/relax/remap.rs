//! # 原子顺序映射
//!
//! VASP 在排序后的 POSCAR 上计算（内部顺序），项目记录使用 POS 的原始顺序
//! （外部顺序）。映射 `M[i]` 给出内部第 i 个原子在外部顺序中的位置。
//!
//! 算法：按标签把外部位置分组（组内保持位置顺序），从左到右扫描内部顺序，
//! 每遇到一个标签就取该组中下一个未使用的外部位置。每个位置恰好使用一次，
//! 因此结果是双射。
//!
//! ## 依赖关系
//! - 被 `relax/report.rs`, `relax/controller.rs` 使用

use crate::error::{RelaxError, Result};
use std::collections::{HashMap, VecDeque};

/// 内部顺序 -> 外部顺序的双射
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRemapper {
    mapping: Vec<usize>,
}

impl IndexRemapper {
    /// 未排序时的恒等映射
    pub fn identity(n: usize) -> Self {
        IndexRemapper {
            mapping: (0..n).collect(),
        }
    }

    /// 由两个标签序列构造映射
    ///
    /// 两个序列不是同一多重集的排列时返回 `InconsistentOrdering`。
    pub fn from_orders<S: AsRef<str>>(internal: &[S], external: &[S]) -> Result<Self> {
        if internal.len() != external.len() {
            return Err(RelaxError::InconsistentOrdering(format!(
                "{} internal atoms vs {} external atoms",
                internal.len(),
                external.len()
            )));
        }

        let mut slots: HashMap<&str, VecDeque<usize>> = HashMap::new();
        for (pos, label) in external.iter().enumerate() {
            slots.entry(label.as_ref()).or_default().push_back(pos);
        }

        let mut mapping = Vec::with_capacity(internal.len());
        for (i, label) in internal.iter().enumerate() {
            let label = label.as_ref();
            let pos = slots
                .get_mut(label)
                .and_then(|queue| queue.pop_front())
                .ok_or_else(|| {
                    RelaxError::InconsistentOrdering(format!(
                        "internal atom {} ('{}') has no unused external position",
                        i, label
                    ))
                })?;
            mapping.push(pos);
        }

        // 长度相等且每个内部原子都取到了位置，外部位置必然全部用完

        Ok(IndexRemapper { mapping })
    }

    /// 映射数组 M
    #[cfg(test)]
    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// 逆映射：外部位置 -> 内部位置
    #[cfg(test)]
    pub fn inverse(&self) -> Vec<usize> {
        let mut inverse = vec![0; self.mapping.len()];
        for (internal, &external) in self.mapping.iter().enumerate() {
            inverse[external] = internal;
        }
        inverse
    }

    /// 按映射散布逐原子数据：`out[M[i]] = data[i]`
    pub fn scatter<T: Clone>(&self, data: &[T]) -> Result<Vec<T>> {
        if data.len() != self.mapping.len() {
            return Err(RelaxError::InconsistentOrdering(format!(
                "{} per-atom values for {} atoms",
                data.len(),
                self.mapping.len()
            )));
        }

        let mut slots: Vec<Option<T>> = vec![None; data.len()];
        for (value, &external) in data.iter().zip(&self.mapping) {
            slots[external] = Some(value.clone());
        }

        // 映射是双射，所有位置都已填充
        Ok(slots.into_iter().flatten().collect())
    }
}
