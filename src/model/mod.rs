//! MMD 模型运行时管理

mod builder;
mod index_buffer;
mod material;
mod runtime;
mod submesh;

pub use builder::ModelBuilder;
pub use index_buffer::IndexBuffer;
pub use material::MmdMaterial;
pub use runtime::MmdModel;
pub use submesh::SubMesh;

use glam::{Vec2, Vec3};

/// 静止姿势顶点数据
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RuntimeVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl RuntimeVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// 模型顶点骨骼权重
///
/// Bdef2 只存第一根骨骼的权重，第二根为 1 - weight。
#[derive(Clone, Debug, PartialEq)]
pub enum VertexWeight {
    Bdef1 { bone: u32 },
    Bdef2 { bones: [u32; 2], weight: f32 },
    Bdef4 { bones: [u32; 4], weights: [f32; 4] },
}

impl VertexWeight {
    /// 引用的骨骼索引
    pub fn bones(&self) -> &[u32] {
        match self {
            VertexWeight::Bdef1 { bone } => std::slice::from_ref(bone),
            VertexWeight::Bdef2 { bones, .. } => bones,
            VertexWeight::Bdef4 { bones, .. } => bones,
        }
    }
}

impl Default for VertexWeight {
    fn default() -> Self {
        VertexWeight::Bdef1 { bone: 0 }
    }
}
