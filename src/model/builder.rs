//! 模型构建（加载器接口）
//!
//! 加载器把解析好的数据逐项写入 `ModelBuilder`，`build` 一次性校验，
//! 之后的每帧更新不再做任何检查。

use glam::{Vec2, Vec3};

use crate::config::get_config;
use crate::morph::{BlendShape, BlendShapeAccumulator};
use crate::skeleton::{
    build_hierarchy, update_global_transforms, update_local_transforms, IkSolver, Node,
};
use crate::skinning::{BonePalette, SkinningContext};
use crate::{MmdError, Result};

use super::{IndexBuffer, MmdMaterial, MmdModel, RuntimeVertex, SubMesh, VertexWeight};

/// 模型构建器
#[derive(Clone, Debug, Default)]
pub struct ModelBuilder {
    name: String,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    weights: Vec<VertexWeight>,
    indices: Vec<u32>,
    materials: Vec<MmdMaterial>,
    submeshes: Vec<SubMesh>,
    nodes: Vec<Node>,
    ik_solvers: Vec<IkSolver>,
    blend_shapes: Vec<BlendShape>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 添加顶点，返回顶点索引
    pub fn add_vertex(&mut self, vertex: RuntimeVertex, weight: VertexWeight) -> usize {
        self.positions.push(vertex.position);
        self.normals.push(vertex.normal);
        self.uvs.push(vertex.uv);
        self.weights.push(weight);
        self.positions.len() - 1
    }

    /// 整体写入顶点属性（各数组长度必须一致）
    pub fn set_vertex_data(
        &mut self,
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        weights: Vec<VertexWeight>,
    ) {
        self.positions = positions;
        self.normals = normals;
        self.uvs = uvs;
        self.weights = weights;
    }

    pub fn set_indices(&mut self, indices: Vec<u32>) {
        self.indices = indices;
    }

    pub fn add_material(&mut self, material: MmdMaterial) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// 添加子网格，必须按索引顺序首尾相接
    ///
    /// 一个子网格都没有添加时，整个索引缓冲区作为材质 0 的一个子网格。
    pub fn add_submesh(&mut self, submesh: SubMesh) {
        self.submeshes.push(submesh);
    }

    pub fn add_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_ik_solver(&mut self, solver: IkSolver) -> usize {
        self.ik_solvers.push(solver);
        self.ik_solvers.len() - 1
    }

    pub fn add_blend_shape(&mut self, shape: BlendShape) -> usize {
        self.blend_shapes.push(shape);
        self.blend_shapes.len() - 1
    }

    /// 校验并创建模型
    ///
    /// 计算初始姿势和 inverse_init，选择索引位宽，计算包围盒，
    /// 并执行一次完整更新，使更新缓冲区立即可用。
    pub fn build(mut self) -> Result<MmdModel> {
        let vertex_count = self.positions.len();
        let node_count = self.nodes.len();

        self.validate_vertices()?;
        self.validate_indices()?;
        self.validate_submeshes()?;
        self.validate_blend_shapes()?;
        self.validate_ik_solvers()?;

        let update_order = build_hierarchy(&mut self.nodes)?;
        for node in self.nodes.iter_mut() {
            node.save_initial_trs();
        }
        update_local_transforms(&mut self.nodes, &update_order);
        update_global_transforms(&mut self.nodes);
        for node in self.nodes.iter_mut() {
            node.calculate_inverse_init_transform();
        }

        let (bbox_min, bbox_max) = bounding_box(&self.positions);
        let indices = IndexBuffer::from_indices(self.indices, vertex_count);

        log::info!(
            "Model '{}' built: {} nodes, {} IK solvers, {} blend shapes, {} vertices, {} indices ({}-bit), {} sub-meshes",
            self.name,
            node_count,
            self.ik_solvers.len(),
            self.blend_shapes.len(),
            vertex_count,
            indices.len(),
            indices.element_size() * 8,
            self.submeshes.len(),
        );

        let config = get_config();
        let mut model = MmdModel {
            name: self.name,
            morph: BlendShapeAccumulator::new(&self.positions),
            update_positions: self.positions.clone(),
            update_normals: self.normals.clone(),
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            weights: self.weights,
            indices,
            materials: self.materials,
            submeshes: self.submeshes,
            bbox_min,
            bbox_max,
            nodes: self.nodes.into(),
            update_order,
            ik_solvers: self.ik_solvers.into(),
            blend_shapes: self.blend_shapes.into(),
            palette: BonePalette::new(),
            skinning: SkinningContext::default(),
            debug_log: config.debug_log,
            debug_logged: false,
        };
        model.update(0.0);
        Ok(model)
    }

    fn validate_vertices(&self) -> Result<()> {
        let vertex_count = self.positions.len();
        for (attribute, len) in [
            ("normals", self.normals.len()),
            ("uvs", self.uvs.len()),
            ("weights", self.weights.len()),
        ] {
            if len != vertex_count {
                return Err(MmdError::AttributeMismatch(format!(
                    "{attribute} has {len} entries, positions has {vertex_count}"
                )));
            }
        }

        let node_count = self.nodes.len();
        for (vertex, weight) in self.weights.iter().enumerate() {
            if let Some(&bone) = weight.bones().iter().find(|&&b| b as usize >= node_count) {
                return Err(MmdError::InvalidVertexBone {
                    vertex,
                    bone: bone as usize,
                    node_count,
                });
            }
        }
        Ok(())
    }

    fn validate_indices(&self) -> Result<()> {
        let vertex_count = self.positions.len();
        match self
            .indices
            .iter()
            .position(|&value| value as usize >= vertex_count)
        {
            Some(position) => Err(MmdError::IndexOutOfRange {
                position,
                value: self.indices[position],
                vertex_count,
            }),
            None => Ok(()),
        }
    }

    fn validate_submeshes(&mut self) -> Result<()> {
        let index_count = self.indices.len();

        if self.submeshes.is_empty() {
            if index_count == 0 {
                return Ok(());
            }
            if self.materials.is_empty() {
                return Err(MmdError::SubMesh(
                    "indices present but no material to draw them with".to_string(),
                ));
            }
            self.submeshes.push(SubMesh::new(0, index_count, 0));
            return Ok(());
        }

        let mut expected_begin = 0;
        for (i, submesh) in self.submeshes.iter().enumerate() {
            if submesh.begin_index != expected_begin {
                return Err(MmdError::SubMesh(format!(
                    "sub-mesh {i} begins at {}, expected {expected_begin}",
                    submesh.begin_index
                )));
            }
            if submesh.material_id >= self.materials.len() {
                return Err(MmdError::SubMesh(format!(
                    "sub-mesh {i} uses material {} (material count {})",
                    submesh.material_id,
                    self.materials.len()
                )));
            }
            expected_begin = submesh.end_index();
        }

        if expected_begin != index_count {
            return Err(MmdError::SubMesh(format!(
                "sub-meshes cover {expected_begin} indices, index buffer has {index_count}"
            )));
        }
        Ok(())
    }

    fn validate_blend_shapes(&self) -> Result<()> {
        let vertex_count = self.positions.len();
        for shape in &self.blend_shapes {
            if let Some(vertex) = shape
                .vertices
                .iter()
                .find(|v| v.index as usize >= vertex_count)
            {
                return Err(MmdError::InvalidBlendShapeVertex {
                    shape: shape.name.clone(),
                    vertex: vertex.index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    fn validate_ik_solvers(&self) -> Result<()> {
        let node_count = self.nodes.len();
        for solver in &self.ik_solvers {
            let referenced = [solver.target_node, solver.effector]
                .into_iter()
                .chain(solver.links.iter().map(|link| link.node));
            for node in referenced {
                if node >= node_count {
                    return Err(MmdError::InvalidIkNode {
                        solver: solver.name.clone(),
                        node,
                    });
                }
            }
        }
        Ok(())
    }
}

fn bounding_box(positions: &[Vec3]) -> (Vec3, Vec3) {
    if positions.is_empty() {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    positions.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), &p| (min.min(p), max.max(p)),
    )
}
