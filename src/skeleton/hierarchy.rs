//! 骨骼层级构建与全局变换传播

use crate::{MmdError, Result};

use super::Node;

/// 校验父子关系、填充子节点列表，返回本地变换的更新顺序
///
/// 更新顺序按 deform_depth 稳定升序排列。
pub fn build_hierarchy(nodes: &mut [Node]) -> Result<Vec<usize>> {
    let node_count = nodes.len();

    for (i, node) in nodes.iter().enumerate() {
        if let Some(parent) = node.parent {
            if parent >= node_count || parent == i {
                return Err(MmdError::InvalidParent { node: i, parent });
            }
        }
    }

    // 沿父链最多走 node_count 步，超过即有环
    for i in 0..node_count {
        let mut current = nodes[i].parent;
        let mut steps = 0;
        while let Some(parent) = current {
            steps += 1;
            if steps > node_count {
                return Err(MmdError::HierarchyCycle { node: i });
            }
            current = nodes[parent].parent;
        }
    }

    for node in nodes.iter_mut() {
        node.children.clear();
    }
    for i in 0..node_count {
        if let Some(parent) = nodes[i].parent {
            nodes[parent].children.push(i);
        }
    }

    let mut sorted: Vec<usize> = (0..node_count).collect();
    sorted.sort_by_key(|&i| nodes[i].deform_depth);
    Ok(sorted)
}

/// 按给定顺序更新本地变换
pub fn update_local_transforms(nodes: &mut [Node], order: &[usize]) {
    for &index in order {
        nodes[index].update_local_transform();
    }
}

/// 从所有根节点开始递归更新全局变换
pub fn update_global_transforms(nodes: &mut [Node]) {
    for index in 0..nodes.len() {
        if nodes[index].parent.is_none() {
            update_global_transform(nodes, index);
        }
    }
}

/// 递归更新节点及其全部后代的全局变换
///
/// 父节点的全局变换必须已是最新。
pub fn update_global_transform(nodes: &mut [Node], index: usize) {
    let global = match nodes[index].parent {
        Some(parent) => nodes[parent].global_transform * nodes[index].local_transform,
        None => nodes[index].local_transform,
    };
    nodes[index].global_transform = global;

    for i in 0..nodes[index].children.len() {
        let child = nodes[index].children[i];
        update_global_transform(nodes, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use proptest::prelude::*;

    fn chain() -> Vec<Node> {
        vec![
            Node::new("root").with_translate(Vec3::new(0.0, 1.0, 0.0)),
            Node::new("mid")
                .with_parent(0)
                .with_translate(Vec3::new(0.0, 1.0, 0.0)),
            Node::new("tip")
                .with_parent(1)
                .with_translate(Vec3::new(0.0, 1.0, 0.0)),
        ]
    }

    #[test]
    fn test_children_filled() {
        let mut nodes = chain();
        build_hierarchy(&mut nodes).unwrap();
        assert_eq!(nodes[0].children, vec![1]);
        assert_eq!(nodes[1].children, vec![2]);
        assert!(nodes[2].children.is_empty());
    }

    #[test]
    fn test_dangling_parent_rejected() {
        let mut nodes = vec![Node::new("a"), Node::new("b").with_parent(7)];
        assert_eq!(
            build_hierarchy(&mut nodes),
            Err(MmdError::InvalidParent { node: 1, parent: 7 })
        );
    }

    #[test]
    fn test_self_parent_rejected() {
        let mut nodes = vec![Node::new("a").with_parent(0)];
        assert!(matches!(
            build_hierarchy(&mut nodes),
            Err(MmdError::InvalidParent { node: 0, parent: 0 })
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut nodes = vec![
            Node::new("a").with_parent(1),
            Node::new("b").with_parent(0),
        ];
        assert!(matches!(
            build_hierarchy(&mut nodes),
            Err(MmdError::HierarchyCycle { .. })
        ));
    }

    #[test]
    fn test_order_follows_deform_depth() {
        let mut nodes = vec![
            Node::new("late").with_deform_depth(2),
            Node::new("early"),
            Node::new("middle").with_deform_depth(1),
            Node::new("early2"),
        ];
        let order = build_hierarchy(&mut nodes).unwrap();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_chain_world_positions() {
        let mut nodes = chain();
        let order = build_hierarchy(&mut nodes).unwrap();
        nodes[1].anim_rotate = Quat::from_rotation_z(-std::f32::consts::FRAC_PI_2);
        update_local_transforms(&mut nodes, &order);
        update_global_transforms(&mut nodes);

        assert!(nodes[1].global_position().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6));
        assert!(nodes[2].global_position().abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn test_subtree_update_reaches_descendants() {
        let mut nodes = chain();
        let order = build_hierarchy(&mut nodes).unwrap();
        update_local_transforms(&mut nodes, &order);
        update_global_transforms(&mut nodes);

        nodes[0].anim_translate = Vec3::new(3.0, 0.0, 0.0);
        nodes[0].update_local_transform();
        update_global_transform(&mut nodes, 0);
        assert!(nodes[2].global_position().abs_diff_eq(Vec3::new(3.0, 3.0, 0.0), 1e-6));
    }

    proptest! {
        #[test]
        fn prop_world_is_parent_world_times_local(
            specs in prop::collection::vec(
                (
                    any::<prop::sample::Index>(),
                    any::<bool>(),
                    (-2.0f32..2.0, -2.0f32..2.0, -2.0f32..2.0),
                    -3.0f32..3.0,
                    0.5f32..2.0,
                ),
                1..24,
            )
        ) {
            let mut nodes: Vec<Node> = specs
                .iter()
                .enumerate()
                .map(|(i, (parent, has_parent, (x, y, z), angle, scale))| {
                    let mut node = Node::new(format!("n{i}"))
                        .with_translate(Vec3::new(*x, *y, *z))
                        .with_rotate(Quat::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalize(), *angle))
                        .with_scale(Vec3::splat(*scale));
                    if i > 0 && *has_parent {
                        node.parent = Some(parent.index(i));
                    }
                    node
                })
                .collect();

            let order = build_hierarchy(&mut nodes).unwrap();
            update_local_transforms(&mut nodes, &order);
            update_global_transforms(&mut nodes);

            for node in &nodes {
                match node.parent {
                    None => prop_assert_eq!(node.global_transform, node.local_transform),
                    Some(parent) => {
                        let expected = nodes[parent].global_transform * node.local_transform;
                        prop_assert!(node.global_transform.abs_diff_eq(expected, 1e-4));
                    }
                }
            }
        }
    }
}
