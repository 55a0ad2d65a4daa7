//! 表情定义

use glam::Vec3;

use crate::registry::Named;

/// 表情顶点偏移
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendShapeVertex {
    pub index: u32,
    pub offset: Vec3,
}

impl BlendShapeVertex {
    pub fn new(index: u32, offset: Vec3) -> Self {
        Self { index, offset }
    }
}

/// 表情：稀疏的顶点偏移集合 + 权重
///
/// 权重不做钳制，超出 [0, 1] 由调用方负责。
#[derive(Clone, Debug, Default)]
pub struct BlendShape {
    pub name: String,
    pub weight: f32,
    pub vertices: Vec<BlendShapeVertex>,
}

impl BlendShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 0.0,
            vertices: Vec::new(),
        }
    }

    pub fn with_vertices(mut self, vertices: Vec<BlendShapeVertex>) -> Self {
        self.vertices = vertices;
        self
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    pub fn reset(&mut self) {
        self.weight = 0.0;
    }

    /// 权重为 0 的表情不参与叠加
    pub fn is_active(&self) -> bool {
        self.weight != 0.0
    }
}

impl Named for BlendShape {
    fn name(&self) -> &str {
        &self.name
    }
}
