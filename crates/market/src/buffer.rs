use std::collections::VecDeque;

/// # Summary
/// 固定容量的滚动历史窗口，始终保留最近 N 个元素。
///
/// # Invariants
/// - 长度永不超过 `capacity`；超出时最旧的元素被淘汰。
/// - 元素按插入（时间）顺序保存。
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    // 内部存储容器，队首为最旧元素
    data: VecDeque<T>,
    // 最大容量
    capacity: usize,
}

impl<T: Clone> RollingWindow<T> {
    /// # Summary
    /// 创建一个新的滚动窗口。
    ///
    /// # Arguments
    /// * `capacity`: 固定容量上限。
    ///
    /// # Returns
    /// 初始化后的 RollingWindow 实例。
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// # Summary
    /// 向窗口追加新元素。
    ///
    /// # Logic
    /// 已满时先淘汰队首最旧元素再追加。
    ///
    /// # Arguments
    /// * `item`: 待插入的元素。
    pub fn push(&mut self, item: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(item);
    }

    /// 当前元素数量
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 窗口是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 最新插入的元素引用
    pub fn last(&self) -> Option<&T> {
        self.data.back()
    }

    /// # Summary
    /// 取最近 `n` 个元素的克隆，按时间升序。
    ///
    /// # Arguments
    /// * `n`: 需要的样本数量，超过现有长度时返回全部。
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let skip = self.data.len().saturating_sub(n);
        self.data.iter().skip(skip).cloned().collect()
    }

    /// 按时间升序的完整数据克隆
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_eviction() {
        let mut w = RollingWindow::new(3);
        for i in 0..5 {
            w.push(i);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.to_vec(), vec![2, 3, 4]);
        assert_eq!(w.last(), Some(&4));
    }

    #[test]
    fn test_last_n_clamped() {
        let mut w = RollingWindow::new(10);
        w.push(1);
        w.push(2);
        assert_eq!(w.last_n(5), vec![1, 2]);
        assert_eq!(w.last_n(1), vec![2]);
        assert!(RollingWindow::<i32>::new(4).last_n(2).is_empty());
    }
}
