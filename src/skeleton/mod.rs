//! 骨骼系统和 IK 求解器

mod hierarchy;
mod ik_solver;
mod node;

pub use hierarchy::{
    build_hierarchy, update_global_transform, update_global_transforms, update_local_transforms,
};
pub use ik_solver::{AngleLimit, IkLink, IkSolveResult, IkSolver};
pub use node::Node;

use crate::registry::Registry;

/// 节点管理器
pub type NodeManager = Registry<Node>;

/// IK 求解器管理器
pub type IkManager = Registry<IkSolver>;
