//! 索引缓冲区

/// 索引缓冲区，位宽由顶点数决定
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    /// 顶点数不超过 65536 且所有索引都能用 16 位表示时选择 16 位
    ///
    /// 超出 16 位的索引不会被截断，而是整个缓冲区改用 32 位。
    pub fn from_indices(indices: Vec<u32>, vertex_count: usize) -> Self {
        let fits_u16 = vertex_count <= u16::MAX as usize + 1
            && indices.iter().all(|&i| i <= u16::MAX as u32);
        if fits_u16 {
            IndexBuffer::U16(indices.into_iter().map(|i| i as u16).collect())
        } else {
            IndexBuffer::U32(indices)
        }
    }

    /// 单个索引的字节数
    pub fn element_size(&self) -> usize {
        match self {
            IndexBuffer::U16(_) => std::mem::size_of::<u16>(),
            IndexBuffer::U32(_) => std::mem::size_of::<u32>(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U16(indices) => indices.len(),
            IndexBuffer::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, position: usize) -> u32 {
        match self {
            IndexBuffer::U16(indices) => indices[position] as u32,
            IndexBuffer::U32(indices) => indices[position],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            IndexBuffer::U16(indices) => Some(indices),
            IndexBuffer::U32(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            IndexBuffer::U16(_) => None,
            IndexBuffer::U32(indices) => Some(indices),
        }
    }
}

impl Default for IndexBuffer {
    fn default() -> Self {
        IndexBuffer::U16(Vec::new())
    }
}
