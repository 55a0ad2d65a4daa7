//! MMD Runtime - MMD 模型每帧更新核心
//!
//! 提供：
//! - 骨骼层级（节点）和世界变换传播
//! - CCD IK 求解
//! - 表情（Blend Shape）叠加
//! - 顶点蒙皮计算
//! - 名称 → 索引 → 对象的统一注册表

pub mod config;
pub mod model;
pub mod morph;
pub mod registry;
pub mod skeleton;
pub mod skinning;

pub use config::RuntimeConfig;
pub use model::{IndexBuffer, MmdMaterial, MmdModel, ModelBuilder, RuntimeVertex, SubMesh, VertexWeight};
pub use morph::{BlendShape, BlendShapeAccumulator, BlendShapeVertex};
pub use registry::{NameLookup, Named, Registry};
pub use skeleton::{AngleLimit, IkLink, IkSolveResult, IkSolver, Node};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MmdError {
    #[error("node {node} has invalid parent index {parent}")]
    InvalidParent { node: usize, parent: usize },

    #[error("node {node} is part of a parent cycle")]
    HierarchyCycle { node: usize },

    #[error("IK solver '{solver}' references unknown node {node}")]
    InvalidIkNode { solver: String, node: usize },

    #[error("blend shape '{shape}' references vertex {vertex} (vertex count {vertex_count})")]
    InvalidBlendShapeVertex {
        shape: String,
        vertex: u32,
        vertex_count: usize,
    },

    #[error("vertex {vertex} references bone {bone} (node count {node_count})")]
    InvalidVertexBone {
        vertex: usize,
        bone: usize,
        node_count: usize,
    },

    #[error("index {position} has value {value} (vertex count {vertex_count})")]
    IndexOutOfRange {
        position: usize,
        value: u32,
        vertex_count: usize,
    },

    #[error("vertex attribute length mismatch: {0}")]
    AttributeMismatch(String),

    #[error("sub-mesh error: {0}")]
    SubMesh(String),
}

pub type Result<T> = std::result::Result<T, MmdError>;
