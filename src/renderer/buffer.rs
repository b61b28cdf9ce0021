use bytemuck::Zeroable;

const GROWTH_FACTOR: f32 = 1.75;
const MIN_CAPACITY: usize = 8;

/// Vec-backed buffer whose logical length is tracked apart from its backing
/// storage. Storage only ever grows; shrinking the logical length keeps the
/// elements around so the next frame can reuse them.
#[derive(Debug, Clone)]
pub struct GrowableBuffer<T> {
    label: &'static str,
    items: Vec<T>,
    len: usize,
}

impl<T: Zeroable + Copy> GrowableBuffer<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            items: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the backing storage holds.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Ensures room for `additional` elements past the logical length.
    pub fn reserve(&mut self, additional: usize) {
        self.ensure_capacity(self.len + additional);
    }

    pub fn ensure_capacity(&mut self, required: usize) {
        let capacity = self.items.len();
        if required <= capacity {
            return;
        }

        let grown = (capacity as f32 * GROWTH_FACTOR) as usize;
        let new_capacity = required.max(grown).max(MIN_CAPACITY);
        log::debug!(
            "Growing {} buffer: {} -> {}",
            self.label,
            capacity,
            new_capacity
        );
        self.items.resize(new_capacity, T::zeroed());
    }

    /// Sets the logical length. Elements that become visible hold whatever
    /// the storage last contained (zero for fresh storage).
    pub fn resize_without_init(&mut self, len: usize) {
        self.ensure_capacity(len);
        self.len = len;
    }

    /// Resets the logical length without touching storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Zero-fills stale elements between the logical length and `previous_len`.
    pub fn clear_stale(&mut self, previous_len: usize) {
        let end = previous_len.min(self.items.len());
        if end > self.len {
            self.items[self.len..end].fill(T::zeroed());
        }
    }

    pub fn push(&mut self, value: T) {
        let index = self.len;
        self.resize_without_init(index + 1);
        self.items[index] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_growth_respects_floor() {
        let mut buffer = GrowableBuffer::<u32>::new("test");
        buffer.resize_without_init(1);

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn growth_is_geometric() {
        let mut buffer = GrowableBuffer::<u32>::new("test");
        buffer.resize_without_init(100);
        buffer.resize_without_init(101);

        assert_eq!(buffer.capacity(), 175);
    }

    #[test]
    fn capacity_never_shrinks() {
        let mut buffer = GrowableBuffer::<f32>::new("test");
        buffer.resize_without_init(64);
        let capacity = buffer.capacity();

        buffer.resize_without_init(3);
        buffer.clear();

        assert_eq!(buffer.capacity(), capacity);
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_stale_only_touches_the_gap() {
        let mut buffer = GrowableBuffer::<u32>::new("test");
        for value in 1..=5 {
            buffer.push(value);
        }

        buffer.clear();
        buffer.push(9);
        buffer.clear_stale(5);
        buffer.resize_without_init(5);

        assert_eq!(buffer.as_slice(), &[9, 0, 0, 0, 0]);
    }
}
