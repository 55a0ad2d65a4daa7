//! 表情叠加
//!
//! 工作缓冲区在帧之间保留，只记录并恢复被偏移过的顶点，
//! 每帧开销与偏移数量成正比，与顶点总数无关。

use glam::Vec3;

use super::BlendShape;

/// 表情叠加器
#[derive(Clone, Debug, Default)]
pub struct BlendShapeAccumulator {
    positions: Vec<Vec3>,
    /// 本帧各顶点的加权偏移之和，只对 `touched` 中的顶点有意义
    deltas: Vec<Vec3>,
    dirty: Vec<bool>,
    touched: Vec<u32>,
}

impl BlendShapeAccumulator {
    /// 以静止姿势初始化工作缓冲区
    pub fn new(base: &[Vec3]) -> Self {
        Self {
            positions: base.to_vec(),
            deltas: vec![Vec3::ZERO; base.len()],
            dirty: vec![false; base.len()],
            touched: Vec::new(),
        }
    }

    /// 叠加后的顶点位置
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// 上一次叠加中被偏移过的顶点数
    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }

    /// 叠加所有权重非零的表情
    ///
    /// 加权偏移先在零初始化的偏移缓冲区里求和，最后才加到静止姿势上，
    /// 所以两个表情交换顺序得到逐位相同的结果。
    pub fn apply<'a, I>(&mut self, base: &[Vec3], shapes: I)
    where
        I: IntoIterator<Item = &'a BlendShape>,
    {
        debug_assert_eq!(base.len(), self.positions.len());

        for &index in &self.touched {
            let i = index as usize;
            self.positions[i] = base[i];
            self.deltas[i] = Vec3::ZERO;
            self.dirty[i] = false;
        }
        self.touched.clear();

        for shape in shapes {
            if !shape.is_active() {
                continue;
            }
            let weight = shape.weight;
            for vertex in &shape.vertices {
                let i = vertex.index as usize;
                self.deltas[i] += vertex.offset * weight;
                if !self.dirty[i] {
                    self.dirty[i] = true;
                    self.touched.push(vertex.index);
                }
            }
        }

        for &index in &self.touched {
            let i = index as usize;
            self.positions[i] = base[i] + self.deltas[i];
        }
    }

    /// 全量恢复为静止姿势（顶点数变化时使用）
    pub fn reset(&mut self, base: &[Vec3]) {
        self.positions.clear();
        self.positions.extend_from_slice(base);
        self.deltas.clear();
        self.deltas.resize(base.len(), Vec3::ZERO);
        self.dirty.clear();
        self.dirty.resize(base.len(), false);
        self.touched.clear();
    }
}
