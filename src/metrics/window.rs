/// Fixed-capacity ring buffer addressed by a head index.
///
/// Once full, every push overwrites the oldest slot in O(1). Iteration
/// runs oldest → newest; call `.rev()` for newest-first.
#[derive(Debug, Clone)]
pub struct RingWindow<T> {
    slots: Vec<T>,
    /// Index of the oldest element once the buffer has wrapped.
    head: usize,
    capacity: usize,
}

impl<T> RingWindow<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Append `item`, evicting the oldest element if the window is full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest → newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (wrapped, fresh) = self.slots.split_at(self.head);
        fresh.iter().chain(wrapped.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_up_to_capacity_in_arrival_order() {
        let mut w = RingWindow::with_capacity(4);
        for i in 0..3 {
            w.push(i);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(w.iter().next_back(), Some(&2));
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let mut w = RingWindow::with_capacity(3);
        for i in 0..8 {
            w.push(i);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert_eq!(w.iter().rev().copied().collect::<Vec<_>>(), vec![7, 6, 5]);
    }

    #[test]
    fn wraps_repeatedly_without_losing_order() {
        let mut w = RingWindow::with_capacity(2);
        for i in 0..5 {
            w.push(i);
        }
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
        w.push(5);
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn zero_capacity_drops_everything() {
        let mut w = RingWindow::with_capacity(0);
        w.push(1);
        assert!(w.is_empty());
        assert_eq!(w.iter().next(), None);
    }
}
