//! 运行时配置
//!
//! 所有参数扁平化，新建的求解器 / 模型在创建时复制当前值。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 运行时配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    // ========== IK ==========
    /// 效果器与目标距离小于此值时停止迭代，默认 1e-3
    pub ik_convergence_threshold: f32,
    /// 单次链接旋转小于此角度（弧度）时跳过，默认 1e-3 度
    pub ik_min_rotation_angle: f32,

    // ========== 蒙皮 ==========
    /// 是否使用 rayon 并行蒙皮，默认 true
    pub parallel_skinning: bool,
    /// 顶点数达到此值才并行，默认 4096
    pub parallel_skinning_min_vertices: usize,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ik_convergence_threshold: 1.0e-3,
            ik_min_rotation_angle: 1.0e-3_f32.to_radians(),

            // 顶点太少时线程调度的开销大于收益
            parallel_skinning: true,
            parallel_skinning_min_vertices: 4096,

            debug_log: false,
        }
    }
}

/// 全局配置实例
static RUNTIME_CONFIG: Lazy<RwLock<RuntimeConfig>> =
    Lazy::new(|| RwLock::new(RuntimeConfig::default()));

/// 获取当前配置（只读副本）
pub fn get_config() -> RuntimeConfig {
    match RUNTIME_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: RuntimeConfig) {
    match RUNTIME_CONFIG.write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(RuntimeConfig::default());
}
