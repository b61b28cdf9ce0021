use super::Handle;

struct Entry<T> {
    generation: u32,
    item: Option<T>,
}

/// Arena of generation-checked entries. Freed slots are reused with a bumped
/// generation so stale handles stop resolving.
pub struct AssetCache<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.item = Some(item);
            return Handle::new(index, entry.generation);
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            item: Some(item),
        });
        Handle::new(index, 0)
    }

    /// Replaces the entry behind `handle` and returns the new handle. The old
    /// handle is invalidated even though the storage slot is the same.
    pub fn replace(&mut self, handle: Handle<T>, item: T) -> Option<Handle<T>> {
        let entry = self.entry_mut(handle)?;
        entry.generation = entry.generation.wrapping_add(1);
        entry.item = Some(item);
        Some(Handle::new(handle.index() as u32, entry.generation))
    }

    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let entry = self.entry_mut(handle)?;
        let item = entry.item.take();
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index() as u32);
        item
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.entries
            .get(handle.index())
            .filter(|entry| entry.generation == handle.generation())
            .and_then(|entry| entry.item.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.entry_mut(handle).and_then(|entry| entry.item.as_mut())
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_mut(&mut self, handle: Handle<T>) -> Option<&mut Entry<T>> {
        self.entries
            .get_mut(handle.index())
            .filter(|entry| entry.generation == handle.generation() && entry.item.is_some())
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
