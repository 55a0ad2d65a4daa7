//! MMD 运行时模型

use glam::{Vec2, Vec3};

use crate::morph::{BlendShape, BlendShapeAccumulator, BlendShapeManager};
use crate::skeleton::{
    update_global_transforms, update_local_transforms, IkManager, IkSolver, Node, NodeManager,
};
use crate::skinning::{compute_skinning, BonePalette, SkinningContext, SkinningInput, SkinningOutput};

use super::{IndexBuffer, MmdMaterial, SubMesh, VertexWeight};

/// MMD 运行时模型
///
/// 由 `ModelBuilder` 创建。每帧流程：动画驱动写入节点动画和表情权重，
/// 然后调用 `update`，渲染器再读取 `update_positions` / `update_normals`。
pub struct MmdModel {
    // 静态数据
    pub(super) name: String,
    pub(super) positions: Vec<Vec3>,
    pub(super) normals: Vec<Vec3>,
    pub(super) uvs: Vec<Vec2>,
    pub(super) weights: Vec<VertexWeight>,
    pub(super) indices: IndexBuffer,
    pub(super) materials: Vec<MmdMaterial>,
    pub(super) submeshes: Vec<SubMesh>,
    pub(super) bbox_min: Vec3,
    pub(super) bbox_max: Vec3,

    // 运行时数据
    pub(super) update_positions: Vec<Vec3>,
    pub(super) update_normals: Vec<Vec3>,

    // 子系统
    pub(super) nodes: NodeManager,
    pub(super) update_order: Vec<usize>,
    pub(super) ik_solvers: IkManager,
    pub(super) blend_shapes: BlendShapeManager,
    pub(super) morph: BlendShapeAccumulator,
    pub(super) palette: BonePalette,
    pub(super) skinning: SkinningContext,

    pub(super) debug_log: bool,
    pub(super) debug_logged: bool,
}

impl MmdModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    // ========== 管理器 ==========

    pub fn nodes(&self) -> &NodeManager {
        &self.nodes
    }

    /// 节点的可变视图
    ///
    /// 层级和更新顺序在构建时固定，所以这里只给出切片，不能再添加节点。
    pub fn nodes_mut(&mut self) -> &mut [Node] {
        self.nodes.as_mut_slice()
    }

    pub fn ik_solvers(&self) -> &IkManager {
        &self.ik_solvers
    }

    pub fn ik_solvers_mut(&mut self) -> &mut [IkSolver] {
        self.ik_solvers.as_mut_slice()
    }

    pub fn blend_shapes(&self) -> &BlendShapeManager {
        &self.blend_shapes
    }

    pub fn blend_shapes_mut(&mut self) -> &mut [BlendShape] {
        self.blend_shapes.as_mut_slice()
    }

    // ========== 渲染数据 ==========

    /// 获取顶点数量
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// 静止姿势位置
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn weights(&self) -> &[VertexWeight] {
        &self.weights
    }

    /// 表情叠加后、蒙皮前的位置
    pub fn blended_positions(&self) -> &[Vec3] {
        self.morph.positions()
    }

    /// 蒙皮后的位置（`update` 返回后有效）
    pub fn update_positions(&self) -> &[Vec3] {
        &self.update_positions
    }

    pub fn update_normals(&self) -> &[Vec3] {
        &self.update_normals
    }

    /// UV 不参与变形，直接返回静止姿势的 UV
    pub fn update_uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn index_buffer(&self) -> &IndexBuffer {
        &self.indices
    }

    pub fn index_element_size(&self) -> usize {
        self.indices.element_size()
    }

    /// 获取索引数量
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn materials(&self) -> &[MmdMaterial] {
        &self.materials
    }

    pub fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }

    pub fn bbox_min(&self) -> Vec3 {
        self.bbox_min
    }

    pub fn bbox_max(&self) -> Vec3 {
        self.bbox_max
    }

    pub fn skinning_context_mut(&mut self) -> &mut SkinningContext {
        &mut self.skinning
    }

    // ========== 动画 ==========

    /// 初始化动画状态：清除动画、基础动画和表情权重，回到初始姿势
    pub fn initialize_animation(&mut self) {
        for node in self.nodes.iter_mut() {
            node.begin_update();
            node.reset_animation();
            node.clear_base_animation();
        }
        self.reset_blend_shape_weights();
        self.update_node_animation();
    }

    /// 开始动画帧
    pub fn begin_animation(&mut self) {
        for node in self.nodes.iter_mut() {
            node.begin_update();
        }
    }

    /// 更新表情
    pub fn update_morph_animation(&mut self) {
        self.morph.apply(&self.positions, self.blend_shapes.iter());
    }

    /// 更新节点变换，然后按注册顺序执行 IK
    pub fn update_node_animation(&mut self) {
        let nodes = self.nodes.as_mut_slice();
        update_local_transforms(nodes, &self.update_order);
        update_global_transforms(nodes);

        for solver in self.ik_solvers.iter_mut() {
            solver.solve(nodes);
        }
    }

    /// 更新顶点（蒙皮计算）
    pub fn update_skinning(&mut self) {
        self.palette.update_from_nodes(self.nodes.as_slice());

        compute_skinning(
            &SkinningInput {
                positions: self.morph.positions(),
                normals: &self.normals,
                weights: &self.weights,
                palette: &self.palette,
            },
            SkinningOutput {
                positions: &mut self.update_positions,
                normals: &mut self.update_normals,
            },
            &self.skinning,
        );

        // 调试日志（只在首次执行）
        if self.debug_log && !self.debug_logged {
            self.debug_logged = true;
            log::debug!(
                "Model '{}' skinning: vertex_count={}, bones={}, parallel={}",
                self.name,
                self.vertex_count(),
                self.palette.len(),
                self.skinning.parallel && self.vertex_count() >= self.skinning.min_parallel_vertices,
            );
        }
    }

    /// 完整更新：表情 -> 节点 -> IK -> 蒙皮
    ///
    /// `elapsed` 只用于日志，姿势只由当前动画状态决定。
    pub fn update(&mut self, elapsed: f32) {
        log::trace!("Model '{}' update, elapsed={elapsed}", self.name);

        self.begin_animation();
        self.update_morph_animation();
        self.update_node_animation();
        self.update_skinning();
    }

    pub fn save_base_animation(&mut self) {
        for node in self.nodes.iter_mut() {
            node.save_base_animation();
        }
    }

    pub fn load_base_animation(&mut self) {
        for node in self.nodes.iter_mut() {
            node.load_base_animation();
        }
    }

    pub fn clear_base_animation(&mut self) {
        for node in self.nodes.iter_mut() {
            node.clear_base_animation();
        }
    }

    pub fn reset_blend_shape_weights(&mut self) {
        for shape in self.blend_shapes.iter_mut() {
            shape.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelBuilder, RuntimeVertex};
    use crate::morph::BlendShapeVertex;
    use crate::registry::NameLookup;
    use glam::Quat;
    use std::f32::consts::FRAC_PI_2;

    /// 两根骨骼，一个三角形：顶点 0 跟随 root，1 跟随 arm，2 各半
    fn triangle_model() -> MmdModel {
        let mut builder = ModelBuilder::new("triangle");
        builder.add_node(Node::new("root"));
        builder.add_node(Node::new("arm").with_parent(0));

        builder.add_vertex(
            RuntimeVertex::new(Vec3::ZERO, Vec3::Z, Vec2::new(0.0, 0.0)),
            VertexWeight::Bdef1 { bone: 0 },
        );
        builder.add_vertex(
            RuntimeVertex::new(Vec3::X, Vec3::Z, Vec2::new(1.0, 0.0)),
            VertexWeight::Bdef1 { bone: 1 },
        );
        builder.add_vertex(
            RuntimeVertex::new(Vec3::Y, Vec3::Z, Vec2::new(0.0, 1.0)),
            VertexWeight::Bdef2 {
                bones: [0, 1],
                weight: 0.5,
            },
        );
        builder.set_indices(vec![0, 1, 2]);
        builder.add_material(MmdMaterial::new("skin"));
        builder.add_blend_shape(
            BlendShape::new("smile")
                .with_vertices(vec![BlendShapeVertex::new(2, Vec3::new(0.0, 0.5, 0.0))]),
        );
        builder.build().unwrap()
    }

    #[test]
    fn test_rest_pose_reproduces_mesh() {
        let mut model = triangle_model();
        model.update(1.0 / 60.0);
        for (skinned, rest) in model.update_positions().iter().zip(model.positions()) {
            assert!(skinned.abs_diff_eq(*rest, 1e-6));
        }
        for normal in model.update_normals() {
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-6));
        }
    }

    #[test]
    fn test_lookup_through_managers() {
        let model = triangle_model();
        assert_eq!(model.nodes().find_index("arm"), Some(1));
        assert_eq!(model.nodes().find_index("leg"), None);
        assert_eq!(model.blend_shapes().find_index("smile"), Some(0));
        assert!(model.ik_solvers().find("any").is_none());
    }

    #[test]
    fn test_blend_shape_then_skinning() {
        let mut model = triangle_model();
        let smile = model.blend_shapes().find_index("smile").unwrap();
        model.blend_shapes_mut()[smile].set_weight(1.0);
        model.update(0.0);
        assert!(model.update_positions()[2].abs_diff_eq(Vec3::new(0.0, 1.5, 0.0), 1e-6));

        model.reset_blend_shape_weights();
        model.update(0.0);
        assert_eq!(model.blended_positions(), model.positions());
    }

    #[test]
    fn test_node_animation_moves_bound_vertices() {
        let mut model = triangle_model();
        let arm = model.nodes().find_index("arm").unwrap();
        model.nodes_mut()[arm].set_animation_rotate(Quat::from_rotation_z(FRAC_PI_2));
        model.update(0.0);

        let p = model.update_positions();
        assert!(p[0].abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(p[1].abs_diff_eq(Vec3::Y, 1e-6));
        // (0,1,0) 半权重：root 不动，arm 转到 (-1,0,0)
        assert!(p[2].abs_diff_eq(Vec3::new(-0.5, 0.5, 0.0), 1e-6));
    }

    #[test]
    fn test_update_uvs_are_rest_uvs() {
        let mut model = triangle_model();
        let before: Vec<Vec2> = model.uvs().to_vec();
        model.nodes_mut()[1].set_animation_translate(Vec3::new(0.0, 3.0, 0.0));
        model.update(0.0);
        assert_eq!(model.update_uvs(), before.as_slice());
        assert!(std::ptr::eq(model.update_uvs(), model.uvs()));
    }

    #[test]
    fn test_base_animation_forwarding() {
        let mut model = triangle_model();
        model.nodes_mut()[1].set_animation_translate(Vec3::X);
        model.save_base_animation();
        model.initialize_animation();
        assert_eq!(model.nodes()[1].anim_translate, Vec3::ZERO);

        model.nodes_mut()[1].set_animation_translate(Vec3::X);
        model.save_base_animation();
        model.nodes_mut()[1].reset_animation();
        model.load_base_animation();
        assert_eq!(model.nodes()[1].anim_translate, Vec3::X);

        model.clear_base_animation();
        model.load_base_animation();
        assert_eq!(model.nodes()[1].anim_translate, Vec3::ZERO);
    }

    #[test]
    fn test_child_follows_parent_after_driver_writes() {
        let mut builder = ModelBuilder::new("pair");
        let root = builder.add_node(Node::new("root").with_translate(Vec3::Y));
        builder.add_node(Node::new("child").with_parent(root).with_translate(Vec3::new(2.0, 0.0, 0.0)));
        let mut model = builder.build().unwrap();
        assert_eq!(model.nodes_mut().len(), 2);

        model.nodes_mut()[root].set_animation_translate(Vec3::Z);
        model.update(0.0);

        let nodes = model.nodes();
        let child = nodes.find("child").unwrap();
        assert!(child.global_position().abs_diff_eq(Vec3::new(2.0, 1.0, 1.0), 1e-6));
        for node in nodes.iter() {
            let expected = match node.parent {
                Some(parent) => nodes[parent].global_transform * node.local_transform,
                None => node.local_transform,
            };
            assert!(node.global_transform.abs_diff_eq(expected, 1e-6));
        }
    }

    #[test]
    fn test_direct_pose_writes_are_reloaded_each_frame() {
        let mut model = triangle_model();
        model.nodes_mut()[1].translate = Vec3::new(0.0, 5.0, 0.0);
        model.nodes_mut()[1].set_animation_translate(Vec3::Z);
        model.update(0.0);

        let arm = &model.nodes()[1];
        assert_eq!(arm.translate, arm.init_translate);
        assert_eq!(arm.anim_translate, Vec3::Z);
        assert!(arm.global_position().abs_diff_eq(Vec3::Z, 1e-6));
    }
}
