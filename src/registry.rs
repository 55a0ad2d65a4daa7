//! 名称注册表
//!
//! 节点、IK 求解器、表情三类对象共用同一套
//! 「数量 / 按名称查找 / 按索引获取」接口。

use std::ops::{Index, IndexMut};

/// 可按名称查找的对象
pub trait Named {
    fn name(&self) -> &str;
}

/// 统一查找接口
///
/// 需要跨类型多态访问时使用（例如下游工具同时遍历骨骼和表情）。
pub trait NameLookup {
    type Item;

    /// 对象数量
    fn count(&self) -> usize;

    /// 按名称查找索引，未找到返回 `None`
    fn find_index(&self, name: &str) -> Option<usize>;

    /// 按索引获取，索引必须有效
    fn get(&self, index: usize) -> &Self::Item;

    /// 按名称获取
    fn find(&self, name: &str) -> Option<&Self::Item> {
        self.find_index(name).map(|index| self.get(index))
    }
}

/// 顺序注册表，添加顺序即索引，模型生命周期内不变
#[derive(Clone, Debug)]
pub struct Registry<T> {
    items: Vec<T>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// 追加对象，返回其索引
    pub fn add(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 获取可变引用，索引必须有效
    pub fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T: Named> Registry<T> {
    /// 按名称获取可变引用
    pub fn find_mut(&mut self, name: &str) -> Option<&mut T> {
        let index = self.find_index(name)?;
        Some(&mut self.items[index])
    }
}

impl<T: Named> NameLookup for Registry<T> {
    type Item = T;

    fn count(&self) -> usize {
        self.items.len()
    }

    /// 线性扫描；重名时返回第一个
    fn find_index(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name() == name)
    }

    fn get(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for Registry<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> Index<usize> for Registry<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> IndexMut<usize> for Registry<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a Registry<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        name: String,
        value: i32,
    }

    impl Named for Item {
        fn name(&self) -> &str {
            &self.name
        }
    }

    fn item(name: &str, value: i32) -> Item {
        Item {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_add_returns_stable_indices() {
        let mut registry = Registry::new();
        assert_eq!(registry.add(item("a", 1)), 0);
        assert_eq!(registry.add(item("b", 2)), 1);
        assert_eq!(registry.count(), 2);
        assert_eq!(registry[1].value, 2);
    }

    #[test]
    fn test_find_missing_is_none() {
        let mut registry = Registry::new();
        registry.add(item("a", 1));
        assert_eq!(registry.find_index("missing"), None);
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn test_duplicate_names_resolve_to_first() {
        let mut registry = Registry::new();
        registry.add(item("dup", 1));
        registry.add(item("other", 2));
        registry.add(item("dup", 3));
        assert_eq!(registry.find_index("dup"), Some(0));
        assert_eq!(registry.find("dup").map(|i| i.value), Some(1));
    }

    #[test]
    fn test_find_mut_updates_in_place() {
        let mut registry = Registry::new();
        registry.add(item("a", 1));
        if let Some(found) = registry.find_mut("a") {
            found.value = 10;
        }
        assert_eq!(registry.get(0).value, 10);
    }

    #[test]
    fn test_lookup_through_trait_object() {
        fn names_found(lookup: &dyn NameLookup<Item = Item>, names: &[&str]) -> usize {
            names.iter().filter(|n| lookup.find_index(n).is_some()).count()
        }

        let registry: Registry<Item> = vec![item("x", 0), item("y", 0)].into();
        assert_eq!(names_found(&registry, &["x", "y", "z"]), 2);
    }
}
