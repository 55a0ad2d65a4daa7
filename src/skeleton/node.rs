//! 骨骼节点

use glam::{Mat4, Quat, Vec3};

use crate::registry::Named;

/// 骨骼节点
///
/// 节点保存在扁平数组中，父子关系全部用索引表示。
///
/// 动画驱动必须通过 `set_animation_translate` / `set_animation_rotate` 写入姿势。
/// `translate` / `rotate` / `scale` 是绑定姿势，每帧的 `begin_update` 都会用初始 TRS
/// 覆盖它们，直接写入在下一次 `MmdModel::update` 时丢失。
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    /// 子节点索引（在 build_hierarchy 中填充）
    pub children: Vec<usize>,
    /// 变形层级，本地变换按此升序更新
    pub deform_depth: i32,

    // 本地 TRS（相对父节点，每帧从初始 TRS 恢复）
    pub translate: Vec3,
    pub rotate: Quat,
    pub scale: Vec3,

    // 初始 TRS（begin_update 时恢复）
    pub init_translate: Vec3,
    pub init_rotate: Quat,
    pub init_scale: Vec3,

    // 动画状态（由外部动画驱动写入）
    pub anim_translate: Vec3,
    pub anim_rotate: Quat,

    // 基础动画（save_base_animation 保存的姿势）
    pub base_anim_translate: Vec3,
    pub base_anim_rotate: Quat,

    // IK 状态
    pub ik_rotate: Quat,
    /// 由 IK 求解器设置：ik_rotate 是否参与本地变换
    pub enable_ik: bool,
    /// 手动固定：为 true 时 IK 求解器不旋转该节点
    pub ik_disabled: bool,

    /// 初始全局变换的逆（蒙皮用）
    pub inverse_init: Mat4,

    // 变换结果
    pub local_transform: Mat4,
    pub global_transform: Mat4,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            deform_depth: 0,
            translate: Vec3::ZERO,
            rotate: Quat::IDENTITY,
            scale: Vec3::ONE,
            init_translate: Vec3::ZERO,
            init_rotate: Quat::IDENTITY,
            init_scale: Vec3::ONE,
            anim_translate: Vec3::ZERO,
            anim_rotate: Quat::IDENTITY,
            base_anim_translate: Vec3::ZERO,
            base_anim_rotate: Quat::IDENTITY,
            ik_rotate: Quat::IDENTITY,
            enable_ik: false,
            ik_disabled: false,
            inverse_init: Mat4::IDENTITY,
            local_transform: Mat4::IDENTITY,
            global_transform: Mat4::IDENTITY,
        }
    }

    /// 指定父节点
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 指定相对父节点的平移
    pub fn with_translate(mut self, translate: Vec3) -> Self {
        self.translate = translate;
        self
    }

    pub fn with_rotate(mut self, rotate: Quat) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_deform_depth(mut self, depth: i32) -> Self {
        self.deform_depth = depth;
        self
    }

    /// 动画平移 = 本地平移 + 动画偏移
    pub fn animate_translate(&self) -> Vec3 {
        self.anim_translate + self.translate
    }

    /// 动画旋转 = 动画旋转 * 本地旋转
    pub fn animate_rotate(&self) -> Quat {
        self.anim_rotate * self.rotate
    }

    pub fn set_animation_translate(&mut self, translate: Vec3) {
        self.anim_translate = translate;
    }

    pub fn set_animation_rotate(&mut self, rotate: Quat) {
        self.anim_rotate = rotate;
    }

    /// 更新本地变换
    ///
    /// local = T(animate_translate) * R(ik_rotate * animate_rotate) * S(scale)，
    /// 只有 enable_ik 时才叠加 ik_rotate。
    pub fn update_local_transform(&mut self) {
        let mut rotation = self.animate_rotate();
        if self.enable_ik {
            rotation = self.ik_rotate * rotation;
        }

        self.local_transform =
            Mat4::from_scale_rotation_translation(self.scale, rotation, self.animate_translate());
    }

    /// 全局位置
    pub fn global_position(&self) -> Vec3 {
        self.global_transform.w_axis.truncate()
    }

    /// 蒙皮矩阵 = 当前全局变换 * 初始全局变换的逆
    pub fn skinning_matrix(&self) -> Mat4 {
        self.global_transform * self.inverse_init
    }

    /// 以当前全局变换为初始姿势
    pub fn calculate_inverse_init_transform(&mut self) {
        self.inverse_init = self.global_transform.inverse();
    }

    pub fn save_initial_trs(&mut self) {
        self.init_translate = self.translate;
        self.init_rotate = self.rotate;
        self.init_scale = self.scale;
    }

    pub fn load_initial_trs(&mut self) {
        self.translate = self.init_translate;
        self.rotate = self.init_rotate;
        self.scale = self.init_scale;
    }

    pub fn save_base_animation(&mut self) {
        self.base_anim_translate = self.anim_translate;
        self.base_anim_rotate = self.anim_rotate;
    }

    pub fn load_base_animation(&mut self) {
        self.anim_translate = self.base_anim_translate;
        self.anim_rotate = self.base_anim_rotate;
    }

    pub fn clear_base_animation(&mut self) {
        self.base_anim_translate = Vec3::ZERO;
        self.base_anim_rotate = Quat::IDENTITY;
    }

    /// 开始更新：恢复初始 TRS，清除 IK 旋转
    pub fn begin_update(&mut self) {
        self.load_initial_trs();
        self.ik_rotate = Quat::IDENTITY;
    }

    /// 清除动画状态
    pub fn reset_animation(&mut self) {
        self.anim_translate = Vec3::ZERO;
        self.anim_rotate = Quat::IDENTITY;
        self.ik_rotate = Quat::IDENTITY;
    }
}

impl Named for Node {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_default_node_is_identity() {
        let mut node = Node::new("root");
        node.update_local_transform();
        assert_eq!(node.local_transform, Mat4::IDENTITY);
        assert_eq!(node.parent, None);
    }

    #[test]
    fn test_local_transform_composes_animation() {
        let mut node = Node::new("bone").with_translate(Vec3::new(0.0, 1.0, 0.0));
        node.set_animation_translate(Vec3::new(1.0, 0.0, 0.0));
        node.set_animation_rotate(Quat::from_rotation_z(FRAC_PI_2));
        node.update_local_transform();

        let p = node.local_transform.transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn test_ik_rotate_only_applies_when_enabled() {
        let mut node = Node::new("bone");
        node.ik_rotate = Quat::from_rotation_z(FRAC_PI_2);
        node.update_local_transform();
        assert_eq!(node.local_transform, Mat4::IDENTITY);

        node.enable_ik = true;
        node.update_local_transform();
        let p = node.local_transform.transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_base_animation_round_trip() {
        let mut node = Node::new("bone");
        node.set_animation_translate(Vec3::new(0.0, 0.5, 0.0));
        node.save_base_animation();
        node.reset_animation();
        assert_eq!(node.anim_translate, Vec3::ZERO);

        node.load_base_animation();
        assert_eq!(node.anim_translate, Vec3::new(0.0, 0.5, 0.0));

        node.clear_base_animation();
        node.load_base_animation();
        assert_eq!(node.anim_translate, Vec3::ZERO);
    }

    #[test]
    fn test_begin_update_restores_initial_trs() {
        let mut node = Node::new("bone").with_translate(Vec3::new(0.0, 2.0, 0.0));
        node.save_initial_trs();
        node.translate = Vec3::new(5.0, 5.0, 5.0);
        node.ik_rotate = Quat::from_rotation_x(0.3);

        node.begin_update();
        assert_eq!(node.translate, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(node.ik_rotate, Quat::IDENTITY);
    }

    #[test]
    fn test_skinning_matrix_is_identity_in_initial_pose() {
        let mut node = Node::new("bone").with_translate(Vec3::new(1.0, 2.0, 3.0));
        node.update_local_transform();
        node.global_transform = node.local_transform;
        node.calculate_inverse_init_transform();
        assert!(node.skinning_matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
