//! MMD 材质定义
//!
//! 只是加载器写入、渲染器读取的数据，更新流程不会使用。

use glam::{Vec3, Vec4};

/// MMD 材质
#[derive(Clone, Debug, PartialEq)]
pub struct MmdMaterial {
    pub name: String,
    /// 漫反射颜色，w 为不透明度
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_power: f32,
    pub ambient: Vec3,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture: Option<String>,
    pub sphere_texture: Option<String>,
    pub toon_texture: Option<String>,
    pub draw_flags: u8,
}

impl MmdMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 是否双面渲染
    pub fn is_double_sided(&self) -> bool {
        (self.draw_flags & 0x01) != 0
    }

    /// 是否投射阴影
    pub fn casts_shadow(&self) -> bool {
        (self.draw_flags & 0x02) != 0
    }

    /// 是否接收阴影
    pub fn receives_shadow(&self) -> bool {
        (self.draw_flags & 0x04) != 0
    }

    /// 是否绘制边缘
    pub fn has_edge(&self) -> bool {
        (self.draw_flags & 0x10) != 0
    }

    pub fn alpha(&self) -> f32 {
        self.diffuse.w
    }
}

impl Default for MmdMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec4::ONE,
            specular: Vec3::ZERO,
            specular_power: 1.0,
            ambient: Vec3::splat(0.5),
            edge_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            edge_size: 1.0,
            texture: None,
            sphere_texture: None,
            toon_texture: None,
            draw_flags: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_flags() {
        let material = MmdMaterial {
            draw_flags: 0x01 | 0x10,
            ..MmdMaterial::new("body")
        };
        assert!(material.is_double_sided());
        assert!(!material.casts_shadow());
        assert!(!material.receives_shadow());
        assert!(material.has_edge());
        assert_eq!(material.alpha(), 1.0);
    }
}
