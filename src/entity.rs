// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity identifiers and the allocator that recycles them.

use std::fmt;

/// Entity handle: a recyclable index plus the generation it was issued in.
///
/// The index is reused after destruction; the generation is bumped each time,
/// so a handle kept past its entity's destruction is rejected rather than
/// silently aliasing the next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Recyclable id, used to index sparse sets and the world's entity table.
    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Issues entity handles, reusing freed indices last-in-first-out.
#[derive(Debug, Clone, Default)]
pub struct EntityAllocator {
    /// Current generation per index ever allocated
    generations: Vec<u32>,
    /// Liveness per index; false while the index sits on the free list
    alive: Vec<bool>,
    /// Freed indices, most recently freed last
    free: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently freed index if any, else the next sequential one.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` indices are ever allocated.
    pub fn create(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            self.alive[index as usize] = true;
            return Entity::new(index, self.generations[index as usize]);
        }

        let index = u32::try_from(self.generations.len())
            .unwrap_or_else(|_| panic!("Entity index exhaustion: {} allocated", self.generations.len()));
        self.generations.push(0);
        self.alive.push(true);
        Entity::new(index, 0)
    }

    /// Free `entity` and bump its generation.
    ///
    /// Returns `false` (and does nothing) if the handle is not currently valid,
    /// so a double destroy can never put an index on the free list twice.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_valid(entity) {
            return false;
        }
        let index = entity.index() as usize;
        self.alive[index] = false;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(entity.index());
        true
    }

    /// True iff the index was allocated, is not on the free list, and the
    /// generation matches.
    pub fn is_valid(&self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        index < self.generations.len()
            && self.alive[index]
            && self.generations[index] == entity.generation()
    }

    /// Number of live entities.
    pub fn alive_count(&self) -> usize {
        self.generations.len() - self.free.len()
    }

    /// Number of indices ever allocated.
    pub fn allocated_count(&self) -> usize {
        self.generations.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut allocator = EntityAllocator::new();
        let ids: Vec<u32> = (0..4).map(|_| allocator.create().index()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(allocator.alive_count(), 4);
    }

    #[test]
    fn test_reuse_is_lifo() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        let b = allocator.create();
        allocator.destroy(a);
        allocator.destroy(b);

        assert_eq!(allocator.create().index(), b.index());
        assert_eq!(allocator.create().index(), a.index());
        assert_eq!(allocator.free_count(), 0);
    }

    #[test]
    fn test_reused_index_gets_new_generation() {
        let mut allocator = EntityAllocator::new();
        let old = allocator.create();
        assert!(allocator.destroy(old));

        let new = allocator.create();
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(allocator.is_valid(new));
        assert!(!allocator.is_valid(old));
    }

    #[test]
    fn test_double_destroy_is_rejected() {
        let mut allocator = EntityAllocator::new();
        let entity = allocator.create();
        assert!(allocator.destroy(entity));
        assert!(!allocator.destroy(entity));
        assert_eq!(allocator.free_count(), 1);
    }

    #[test]
    fn test_never_allocated_is_invalid() {
        let allocator = EntityAllocator::new();
        assert!(!allocator.is_valid(Entity::new(0, 0)));
    }
}
