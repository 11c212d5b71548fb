use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 线程安全的定长队列
///
/// 队列满时丢弃最旧的元素再放入新元素（drop-oldest），淘汰与插入在同一把锁内完成，
/// 并发的生产者/消费者不会看到超过 `capacity` 个元素。
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// 容量至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// 非阻塞放入；队列已满时返回被淘汰的最旧元素
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = {
            let mut items = self.items.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            evicted
        };
        self.not_empty.notify_one();
        evicted
    }

    /// 非阻塞取出最旧的元素
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// 阻塞等待，最多 `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if self.not_empty.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    /// 取出全部元素，最旧的在前
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_overflow_keeps_newest_in_order() {
        let queue = BoundedQueue::new(3);
        let mut evicted = Vec::new();
        for i in 0..7 {
            if let Some(old) = queue.push(i) {
                evicted.push(old);
            }
        }

        assert_eq!(evicted, vec![0, 1, 2, 3]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain(), vec![4, 5, 6]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_below_capacity_evicts_nothing() {
        let queue = BoundedQueue::new(2);
        assert!(queue.push("a").is_none());
        assert!(queue.push("b").is_none());
        assert_eq!(queue.push("c"), Some("a"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.drain(), vec![2]);
    }

    #[test]
    fn test_try_pop_is_fifo() {
        let queue = BoundedQueue::new(4);
        assert!(queue.try_pop().is_none());
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_pop_timeout_returns_none_when_empty() {
        let queue: BoundedQueue<u32> = BoundedQueue::new(2);
        let start = Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_pop_timeout_wakes_on_push() {
        let queue = Arc::new(BoundedQueue::new(2));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                queue.push(42u32);
            })
        };

        let item = queue.pop_timeout(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(item, Some(42));
    }

    #[test]
    fn test_concurrent_producers_never_exceed_capacity() {
        let queue = Arc::new(BoundedQueue::new(5));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..500 {
                        queue.push(t * 1000 + i);
                        assert!(queue.len() <= 5);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_clear() {
        let queue = BoundedQueue::new(3);
        queue.push(1);
        queue.clear();
        assert!(queue.is_empty());
    }
}
