//! IK 求解器（CCD）

use glam::{EulerRot, Quat, Vec3};
use std::f32::consts::PI;

use crate::config::get_config;
use crate::registry::Named;

use super::hierarchy::update_global_transform;
use super::Node;

/// 链接的欧拉角限制（XYZ 顺序，弧度）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleLimit {
    pub min: Vec3,
    pub max: Vec3,
}

impl AngleLimit {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// 膝盖：只绕 X 轴，范围 [-180°, -0.5°]
    pub fn knee() -> Self {
        Self {
            min: Vec3::new(-PI, 0.0, 0.0),
            max: Vec3::new((-0.5_f32).to_radians(), 0.0, 0.0),
        }
    }

    /// 仅限制单轴（另两轴固定为 0）时返回该轴
    fn plane_axis(&self) -> Option<SolveAxis> {
        let pinned = |i: usize| self.min[i] == 0.0 && self.max[i] == 0.0;
        if pinned(1) && pinned(2) {
            Some(SolveAxis::X)
        } else if pinned(0) && pinned(2) {
            Some(SolveAxis::Y)
        } else if pinned(0) && pinned(1) {
            Some(SolveAxis::Z)
        } else {
            None
        }
    }

    /// 把旋转的 XYZ 欧拉分解夹到限制范围内
    pub fn clamp_rotation(&self, rotation: Quat) -> Quat {
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Quat::from_euler(
            EulerRot::XYZ,
            x.clamp(self.min.x, self.max.x),
            y.clamp(self.min.y, self.max.y),
            z.clamp(self.min.z, self.max.z),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SolveAxis {
    X,
    Y,
    Z,
}

impl SolveAxis {
    fn index(self) -> usize {
        match self {
            SolveAxis::X => 0,
            SolveAxis::Y => 1,
            SolveAxis::Z => 2,
        }
    }

    fn unit(self) -> Vec3 {
        match self {
            SolveAxis::X => Vec3::X,
            SolveAxis::Y => Vec3::Y,
            SolveAxis::Z => Vec3::Z,
        }
    }
}

/// IK 链接
#[derive(Clone, Debug)]
pub struct IkLink {
    pub node: usize,
    pub limit: Option<AngleLimit>,
    /// 单轴模式下累计的铰链角度
    plane_mode_angle: f32,
    saved_ik_rotate: Quat,
}

impl IkLink {
    pub fn new(node: usize) -> Self {
        Self {
            node,
            limit: None,
            plane_mode_angle: 0.0,
            saved_ik_rotate: Quat::IDENTITY,
        }
    }

    pub fn with_limit(mut self, limit: AngleLimit) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// 一次求解的诊断信息
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IkSolveResult {
    /// 实际执行的迭代次数
    pub iterations: u32,
    /// 效果器到目标的最终距离
    pub distance: f32,
    /// 距离是否低于收敛阈值
    pub converged: bool,
}

/// IK 求解器
///
/// `links` 从紧邻效果器的链接开始，依次指向链根。
#[derive(Clone, Debug)]
pub struct IkSolver {
    pub name: String,
    /// 目标节点（其全局位置为求解目标）
    pub target_node: usize,
    /// 效果器（链末端）
    pub effector: usize,
    pub links: Vec<IkLink>,
    /// 最大迭代次数
    pub iterations: u32,
    /// 单步旋转角度上限
    pub limit_angle: f32,
    pub convergence_threshold: f32,
    pub enabled: bool,
    min_rotation_angle: f32,
}

impl IkSolver {
    pub fn new(name: impl Into<String>, target_node: usize, effector: usize) -> Self {
        let config = get_config();
        Self {
            name: name.into(),
            target_node,
            effector,
            links: Vec::new(),
            iterations: 1,
            limit_angle: PI,
            convergence_threshold: config.ik_convergence_threshold,
            enabled: true,
            min_rotation_angle: config.ik_min_rotation_angle,
        }
    }

    pub fn with_links(mut self, links: Vec<IkLink>) -> Self {
        self.links = links;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_limit_angle(mut self, limit_angle: f32) -> Self {
        self.limit_angle = limit_angle;
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f32) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// 效果器到目标的当前距离
    pub fn distance(&self, nodes: &[Node]) -> f32 {
        (nodes[self.effector].global_position() - nodes[self.target_node].global_position())
            .length()
    }

    /// 求解 IK
    ///
    /// 保留迭代中最好的姿势；某次迭代没有改善时恢复最好的姿势并停止。
    /// 不收敛不是错误，结果只是尽力而为的姿势。
    pub fn solve(&mut self, nodes: &mut [Node]) -> IkSolveResult {
        if !self.enabled {
            for link in &self.links {
                let node = &mut nodes[link.node];
                node.enable_ik = false;
                node.update_local_transform();
                update_global_transform(nodes, link.node);
            }
            return IkSolveResult {
                iterations: 0,
                distance: self.distance(nodes),
                converged: false,
            };
        }

        // 初始化 IK 链
        for link in &mut self.links {
            link.plane_mode_angle = 0.0;
            let node = &mut nodes[link.node];
            node.ik_rotate = Quat::IDENTITY;
            node.enable_ik = !node.ik_disabled;
            node.update_local_transform();
            update_global_transform(nodes, link.node);
        }

        let mut best_distance = f32::MAX;
        let mut iterations = 0;

        for iteration in 0..self.iterations {
            self.solve_core(nodes, iteration);
            iterations = iteration + 1;

            let distance = self.distance(nodes);
            if distance < best_distance {
                best_distance = distance;
                for link in &mut self.links {
                    link.saved_ik_rotate = nodes[link.node].ik_rotate;
                }
            } else {
                // 恢复最佳结果
                for link in &self.links {
                    let node = &mut nodes[link.node];
                    node.ik_rotate = link.saved_ik_rotate;
                    node.update_local_transform();
                    update_global_transform(nodes, link.node);
                }
                break;
            }

            if distance <= self.convergence_threshold {
                break;
            }
        }

        let distance = if iterations == 0 {
            self.distance(nodes)
        } else {
            best_distance
        };

        log::trace!(
            "IK '{}': {} iterations, distance {:.6}",
            self.name,
            iterations,
            distance
        );

        IkSolveResult {
            iterations,
            distance,
            converged: distance <= self.convergence_threshold,
        }
    }

    /// 一次完整的链遍历
    ///
    /// 除最靠近链根的活动链接外，每个链接先弯曲到让下一个链接到效果器的距离
    /// 等于它到目标的距离；最后一个链接再把效果器转向目标。
    fn solve_core(&mut self, nodes: &mut [Node], iteration: u32) {
        let ik_pos = nodes[self.target_node].global_position();

        for i in 0..self.links.len() {
            let link_index = self.links[i].node;
            if link_index == self.effector || nodes[link_index].ik_disabled {
                continue;
            }

            if let Some(axis) = self.links[i].limit.and_then(|l| l.plane_axis()) {
                self.solve_plane(nodes, i, axis, iteration, ik_pos);
                continue;
            }

            let rot = match self.next_pivot(nodes, i) {
                Some(pivot) => self.reach_rotation(nodes, link_index, pivot, ik_pos),
                None => self.align_rotation(nodes, link_index, ik_pos),
            };
            if let Some(rot) = rot {
                self.rotate_link(nodes, i, rot);
            }
        }
    }

    /// 链上更靠近根部的下一个活动链接的全局位置
    fn next_pivot(&self, nodes: &[Node], link: usize) -> Option<Vec3> {
        self.links[link + 1..]
            .iter()
            .map(|l| l.node)
            .find(|&node| node != self.effector && !nodes[node].ik_disabled)
            .map(|node| nodes[node].global_position())
    }

    /// 把效果器方向转向目标方向的旋转（链接本地空间）
    fn align_rotation(&self, nodes: &[Node], link_index: usize, ik_pos: Vec3) -> Option<Quat> {
        let effector_pos = nodes[self.effector].global_position();

        let inv_chain = nodes[link_index].global_transform.inverse();
        let chain_ik_vec = inv_chain.transform_point3(ik_pos).normalize_or_zero();
        let chain_target_vec = inv_chain.transform_point3(effector_pos).normalize_or_zero();
        if chain_ik_vec == Vec3::ZERO || chain_target_vec == Vec3::ZERO {
            return None;
        }

        let cross = chain_target_vec.cross(chain_ik_vec);
        let angle = cross.length().atan2(chain_target_vec.dot(chain_ik_vec));
        if angle < self.min_rotation_angle {
            return None;
        }

        // 反向共线时叉积为零，任取一条垂直轴
        let axis = match cross.try_normalize() {
            Some(axis) => axis,
            None => chain_target_vec.any_orthonormal_vector(),
        };
        Some(Quat::from_axis_angle(axis, angle.min(self.limit_angle)))
    }

    /// 按余弦定理弯曲链接，使 `pivot` 到效果器的距离等于 `pivot` 到目标的距离
    ///
    /// 目标超出范围时把链接伸直（或完全折叠），之后由更靠近链根的链接负责对准方向。
    fn reach_rotation(
        &self,
        nodes: &[Node],
        link_index: usize,
        pivot: Vec3,
        ik_pos: Vec3,
    ) -> Option<Quat> {
        let inv_chain = nodes[link_index].global_transform.inverse();
        let to_pivot = inv_chain.transform_point3(pivot);
        let to_effector = inv_chain.transform_point3(nodes[self.effector].global_position());
        let to_target = inv_chain.transform_point3(ik_pos);

        let upper = to_pivot.length();
        let lower = to_effector.length();
        if upper <= f32::EPSILON || lower <= f32::EPSILON {
            return self.align_rotation(nodes, link_index, ik_pos);
        }

        let reach = (to_target - to_pivot).length();
        let desired = if reach >= upper + lower {
            PI
        } else if reach <= (upper - lower).abs() {
            0.0
        } else {
            ((upper * upper + lower * lower - reach * reach) / (2.0 * upper * lower))
                .clamp(-1.0, 1.0)
                .acos()
        };

        let bend_plane = to_pivot.cross(to_effector);
        let current = bend_plane.length().atan2(to_pivot.dot(to_effector));
        let delta = (desired - current).clamp(-self.limit_angle, self.limit_angle);
        if delta.abs() < self.min_rotation_angle {
            return None;
        }

        // 伸直或折叠时弯曲平面不确定，优先选包含目标的平面
        let axis = if bend_plane.length() > 1.0e-6 * upper * lower {
            bend_plane.normalize()
        } else {
            let toward_target = to_pivot.cross(to_target);
            if toward_target.length() > 1.0e-6 * upper * to_target.length() {
                toward_target.normalize()
            } else {
                (to_pivot / upper).any_orthonormal_vector()
            }
        };
        Some(Quat::from_axis_angle(axis, delta))
    }

    /// 在链接本地空间施加旋转，并按角度限制夹紧
    fn rotate_link(&self, nodes: &mut [Node], link: usize, rot: Quat) {
        let link_index = self.links[link].node;
        let animate_rotate = nodes[link_index].animate_rotate();
        let mut chain_rot = (nodes[link_index].ik_rotate * animate_rotate * rot).normalize();
        if let Some(limit) = self.links[link].limit {
            chain_rot = limit.clamp_rotation(chain_rot);
        }

        let node = &mut nodes[link_index];
        node.ik_rotate = chain_rot * animate_rotate.inverse();
        node.update_local_transform();
        update_global_transform(nodes, link_index);
    }

    /// 单轴（铰链）求解
    fn solve_plane(
        &mut self,
        nodes: &mut [Node],
        link: usize,
        axis: SolveAxis,
        iteration: u32,
        ik_pos: Vec3,
    ) {
        let link_index = self.links[link].node;
        let Some(limit) = self.links[link].limit else {
            return;
        };
        let axis_index = axis.index();
        let rotate_axis = axis.unit();
        let (min, max) = (limit.min[axis_index], limit.max[axis_index]);

        let effector_pos = nodes[self.effector].global_position();
        let inv_chain = nodes[link_index].global_transform.inverse();
        let chain_ik_vec = inv_chain.transform_point3(ik_pos).normalize_or_zero();
        let chain_target_vec = inv_chain.transform_point3(effector_pos).normalize_or_zero();
        if chain_ik_vec == Vec3::ZERO || chain_target_vec == Vec3::ZERO {
            return;
        }

        let dot = chain_target_vec.dot(chain_ik_vec).clamp(-1.0, 1.0);
        let angle = dot.acos().min(self.limit_angle);

        // 试探两个方向，取更接近目标的一侧
        let dot1 = (Quat::from_axis_angle(rotate_axis, angle) * chain_target_vec).dot(chain_ik_vec);
        let dot2 =
            (Quat::from_axis_angle(rotate_axis, -angle) * chain_target_vec).dot(chain_ik_vec);

        let mut new_angle = self.links[link].plane_mode_angle;
        if dot1 > dot2 {
            new_angle += angle;
        } else {
            new_angle -= angle;
        }

        // 首次迭代越界时翻转方向，让关节朝允许的一侧弯曲
        if iteration == 0 && (new_angle < min || new_angle > max) {
            if -new_angle > min && -new_angle < max {
                new_angle = -new_angle;
            } else {
                let half = (min + max) * 0.5;
                if (half - new_angle).abs() > (half + new_angle).abs() {
                    new_angle = -new_angle;
                }
            }
        }

        let new_angle = new_angle.clamp(min, max);
        self.links[link].plane_mode_angle = new_angle;

        let node = &mut nodes[link_index];
        node.ik_rotate =
            Quat::from_axis_angle(rotate_axis, new_angle) * node.animate_rotate().inverse();
        node.update_local_transform();
        update_global_transform(nodes, link_index);
    }
}

impl Named for IkSolver {
    fn name(&self) -> &str {
        &self.name
    }
}
