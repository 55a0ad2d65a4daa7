//! 表情（Blend Shape）变形系统

mod accumulator;
mod blend_shape;

pub use accumulator::BlendShapeAccumulator;
pub use blend_shape::{BlendShape, BlendShapeVertex};

use crate::registry::Registry;

/// 表情管理器
pub type BlendShapeManager = Registry<BlendShape>;
