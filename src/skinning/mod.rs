//! 顶点蒙皮计算

mod skinning;

pub use skinning::{compute_skinning, BonePalette, SkinningContext};

use glam::Vec3;

use crate::model::VertexWeight;

/// 蒙皮输入数据
pub struct SkinningInput<'a> {
    /// 表情叠加后的顶点位置
    pub positions: &'a [Vec3],
    /// 原始顶点法线
    pub normals: &'a [Vec3],
    /// 顶点权重
    pub weights: &'a [VertexWeight],
    /// 骨骼蒙皮矩阵与法线矩阵
    pub palette: &'a BonePalette,
}

/// 蒙皮输出（写入模型的更新缓冲区）
pub struct SkinningOutput<'a> {
    pub positions: &'a mut [Vec3],
    pub normals: &'a mut [Vec3],
}
