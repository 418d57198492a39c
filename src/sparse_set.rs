//! Sparse set over small non-negative integer ids.
//!
//! Two parallel arrays: `sparse[id]` holds the id's slot in `dense`, and
//! `dense[slot]` holds the id. Membership is valid only when both agree and the
//! slot is below `len`, so stale `sparse` entries never need clearing.
//!
//! The sparse array is sized by the largest id ever inserted, not by the
//! number of live members. Very large, sparse ids waste memory.

/// Result of a swap-remove: which dense slot was vacated and which id (if
/// any) was moved from the last slot to fill it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRemoval {
    /// Dense slot the removed id occupied.
    pub index: usize,
    /// Id that now occupies `index`, or `None` if the removed id was last.
    pub moved: Option<u32>,
}

/// O(1) insert/remove/contains set with dense iteration.
#[derive(Debug, Clone)]
pub struct SparseSet {
    sparse: Vec<u32>,
    dense: Vec<u32>,
    len: usize,
}

impl SparseSet {
    /// Default number of slots allocated up front.
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sparse: vec![0; capacity],
            dense: vec![0; capacity],
            len: 0,
        }
    }

    /// Number of slots currently backing the set.
    pub fn capacity(&self) -> usize {
        self.sparse.len()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has(&self, id: u32) -> bool {
        self.dense_index_of(id).is_some()
    }

    /// Dense slot of `id`, if present.
    pub fn dense_index_of(&self, id: u32) -> Option<usize> {
        let slot = *self.sparse.get(id as usize)? as usize;
        (slot < self.len && self.dense[slot] == id).then_some(slot)
    }

    /// Id stored at dense slot `index`.
    pub fn id_at(&self, index: usize) -> Option<u32> {
        (index < self.len).then(|| self.dense[index])
    }

    /// Insert `id`. Returns `false` if it was already present.
    pub fn add(&mut self, id: u32) -> bool {
        if self.has(id) {
            return false;
        }

        let required = (id as usize + 1).max(self.len + 1);
        if required > self.capacity() {
            self.grow(required);
        }

        self.sparse[id as usize] = self.len as u32;
        self.dense[self.len] = id;
        self.len += 1;
        true
    }

    /// Remove `id`. Returns `false` if it was absent.
    pub fn remove(&mut self, id: u32) -> bool {
        self.swap_remove(id).is_some()
    }

    /// Remove `id` by moving the last member into its slot.
    ///
    /// Any dense index cached for the moved id is invalidated; the returned
    /// [`SwapRemoval`] tells the caller which slot to patch.
    pub fn swap_remove(&mut self, id: u32) -> Option<SwapRemoval> {
        let index = self.dense_index_of(id)?;
        let last = self.len - 1;
        let last_id = self.dense[last];

        self.dense[index] = last_id;
        self.sparse[last_id as usize] = index as u32;
        self.len = last;

        Some(SwapRemoval {
            index,
            moved: (index != last).then_some(last_id),
        })
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Members in dense order. Stable only until the next mutation.
    pub fn as_slice(&self) -> &[u32] {
        &self.dense[..self.len]
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, u32>> {
        self.as_slice().iter().copied()
    }

    fn grow(&mut self, required: usize) {
        let new_capacity = required.max(self.capacity() * 2);
        self.sparse.resize(new_capacity, 0);
        self.dense.resize(new_capacity, 0);
    }
}

impl Default for SparseSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a SparseSet {
    type Item = u32;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
