//! 顶点蒙皮计算

use glam::{Mat3, Mat4, Vec3};
use rayon::prelude::*;

use crate::config::get_config;
use crate::model::VertexWeight;
use crate::skeleton::Node;

use super::{SkinningInput, SkinningOutput};

/// 每帧的骨骼矩阵表
///
/// 法线矩阵为蒙皮矩阵线性部分的逆转置，每根骨骼只算一次。
#[derive(Clone, Debug, Default)]
pub struct BonePalette {
    skinning: Vec<Mat4>,
    normal: Vec<Mat3>,
}

impl BonePalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_matrices(matrices: &[Mat4]) -> Self {
        let mut palette = Self::new();
        palette.update(matrices.iter().copied());
        palette
    }

    /// 用节点当前的蒙皮矩阵刷新
    pub fn update_from_nodes(&mut self, nodes: &[Node]) {
        self.update(nodes.iter().map(Node::skinning_matrix));
    }

    pub fn update(&mut self, matrices: impl Iterator<Item = Mat4>) {
        self.skinning.clear();
        self.normal.clear();
        for m in matrices {
            self.skinning.push(m);
            self.normal.push(normal_matrix(&m));
        }
    }

    pub fn len(&self) -> usize {
        self.skinning.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skinning.is_empty()
    }

    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning
    }

    pub fn normal_matrices(&self) -> &[Mat3] {
        &self.normal
    }
}

fn normal_matrix(m: &Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(*m);
    // 缩放为 0 时无法求逆，退化为线性部分
    if linear.determinant().abs() <= f32::EPSILON {
        linear
    } else {
        linear.inverse().transpose()
    }
}

/// 蒙皮上下文
#[derive(Clone, Debug)]
pub struct SkinningContext {
    pub parallel: bool,
    pub min_parallel_vertices: usize,
}

impl SkinningContext {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            min_parallel_vertices: usize::MAX,
        }
    }

    fn use_parallel(&self, vertex_count: usize) -> bool {
        self.parallel && vertex_count >= self.min_parallel_vertices
    }
}

impl Default for SkinningContext {
    fn default() -> Self {
        let config = get_config();
        Self {
            parallel: config.parallel_skinning,
            min_parallel_vertices: config.parallel_skinning_min_vertices,
        }
    }
}

/// 计算蒙皮，结果写入 output
///
/// 每个顶点只依赖自身输入和所引用骨骼的矩阵，顶点之间没有依赖。
pub fn compute_skinning(input: &SkinningInput, output: SkinningOutput, context: &SkinningContext) {
    let vertex_count = input.positions.len();
    debug_assert_eq!(input.normals.len(), vertex_count);
    debug_assert_eq!(input.weights.len(), vertex_count);
    debug_assert_eq!(output.positions.len(), vertex_count);
    debug_assert_eq!(output.normals.len(), vertex_count);

    let palette = input.palette;

    if context.use_parallel(vertex_count) {
        output
            .positions
            .par_iter_mut()
            .zip(output.normals.par_iter_mut())
            .zip(input.positions.par_iter())
            .zip(input.normals.par_iter())
            .zip(input.weights.par_iter())
            .for_each(|((((pos_out, norm_out), position), normal), weight)| {
                let (pos, norm) = compute_single_vertex(*position, *normal, weight, palette);
                *pos_out = pos;
                *norm_out = norm;
            });
    } else {
        output
            .positions
            .iter_mut()
            .zip(output.normals.iter_mut())
            .zip(input.positions)
            .zip(input.normals)
            .zip(input.weights)
            .for_each(|((((pos_out, norm_out), position), normal), weight)| {
                let (pos, norm) = compute_single_vertex(*position, *normal, weight, palette);
                *pos_out = pos;
                *norm_out = norm;
            });
    }
}

/// 计算单个顶点的蒙皮
fn compute_single_vertex(
    position: Vec3,
    normal: Vec3,
    weight: &VertexWeight,
    palette: &BonePalette,
) -> (Vec3, Vec3) {
    let matrices = &palette.skinning;
    let normals = &palette.normal;

    match weight {
        VertexWeight::Bdef1 { bone } => {
            let b = *bone as usize;
            let pos = matrices[b].transform_point3(position);
            let norm = (normals[b] * normal).normalize_or_zero();
            (pos, norm)
        }
        VertexWeight::Bdef2 { bones, weight } => {
            let (b0, b1) = (bones[0] as usize, bones[1] as usize);
            let w0 = *weight;
            let w1 = 1.0 - w0;

            let pos = matrices[b0].transform_point3(position) * w0
                + matrices[b1].transform_point3(position) * w1;
            let norm = ((normals[b0] * normal) * w0 + (normals[b1] * normal) * w1)
                .normalize_or_zero();
            (pos, norm)
        }
        VertexWeight::Bdef4 { bones, weights } => {
            let mut pos = Vec3::ZERO;
            let mut norm = Vec3::ZERO;

            for (&bone, &w) in bones.iter().zip(weights) {
                let b = bone as usize;
                pos += matrices[b].transform_point3(position) * w;
                norm += (normals[b] * normal) * w;
            }

            (pos, norm.normalize_or_zero())
        }
    }
}
