use crate::error::{BufferKind, GeneratorError};

use super::buffer::GrowableBuffer;

/// Per-submesh triangle index lists. Lists persist across frames so that
/// frames with unchanged topology can keep last frame's indices.
#[derive(Debug, Default)]
pub struct TriangleIndexer {
    lists: Vec<GrowableBuffer<u32>>,
    previous_lens: Vec<usize>,
    submesh_count: usize,
}

impl TriangleIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts rewriting the list of submesh `index`.
    pub fn begin_submesh(&mut self, index: usize) {
        while self.lists.len() <= index {
            self.lists.push(GrowableBuffer::new("triangle"));
            self.previous_lens.push(0);
        }
        let list = &mut self.lists[index];
        self.previous_lens[index] = list.len();
        list.clear();
    }

    /// Appends `triangles`, offset so they address vertices from
    /// `first_vertex` on.
    pub fn append(&mut self, index: usize, triangles: &[u16], first_vertex: usize) {
        let Some(list) = self.lists.get_mut(index) else {
            return;
        };
        let start = list.len();
        list.resize_without_init(start + triangles.len());
        let base = first_vertex as u32;
        for (dst, &triangle) in list.as_mut_slice()[start..].iter_mut().zip(triangles) {
            *dst = base + u32::from(triangle);
        }
    }

    /// Finishes submesh `index`. Storage past the new length that last
    /// frame's list occupied is zeroed, never freed.
    pub fn end_submesh(&mut self, index: usize) {
        if let Some(list) = self.lists.get_mut(index) {
            list.clear_stale(self.previous_lens[index]);
        }
    }

    pub fn set_submesh_count(&mut self, count: usize) {
        self.submesh_count = count;
    }

    pub fn submesh_count(&self) -> usize {
        self.submesh_count
    }

    pub fn submesh(&self, index: usize) -> Option<&[u32]> {
        if index >= self.submesh_count {
            return None;
        }
        self.lists.get(index).map(GrowableBuffer::as_slice)
    }

    pub fn submeshes(&self) -> impl Iterator<Item = &[u32]> + '_ {
        self.lists
            .iter()
            .take(self.submesh_count)
            .map(GrowableBuffer::as_slice)
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.submeshes().map(<[u32]>::len).collect()
    }

    pub fn total_len(&self) -> usize {
        self.submeshes().map(<[u32]>::len).sum()
    }

    /// Copies every list back to back into `dst`; returns the index count.
    pub fn copy_into(&self, dst: &mut [u32]) -> Result<usize, GeneratorError> {
        let required = self.total_len();
        if dst.len() < required {
            return Err(GeneratorError::BufferTooSmall {
                buffer: BufferKind::Triangles,
                required,
                available: dst.len(),
            });
        }

        let mut offset = 0;
        for list in self.submeshes() {
            dst[offset..offset + list.len()].copy_from_slice(list);
            offset += list.len();
        }
        Ok(offset)
    }
}
