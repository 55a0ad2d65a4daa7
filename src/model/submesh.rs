//! 子网格定义

/// 子网格：索引缓冲区中的一段连续区间 + 材质
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubMesh {
    pub begin_index: usize,
    pub index_count: usize,
    pub material_id: usize,
}

impl SubMesh {
    pub fn new(begin_index: usize, index_count: usize, material_id: usize) -> Self {
        Self {
            begin_index,
            index_count,
            material_id,
        }
    }

    /// 区间末尾（不含）
    pub fn end_index(&self) -> usize {
        self.begin_index + self.index_count
    }
}
