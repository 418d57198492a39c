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

//! Archetype storage with row allocation and removal
//!
//! An archetype owns every entity whose component set equals its signature.
//! Rows are dense: the entity sparse set, the handle list and every column
//! are swap-removed together, so row `i` always describes one entity.

use std::any::{type_name, Any, TypeId};
use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::bitset::BitSet;
use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::sparse_set::SparseSet;

/// Component signature: bit `i` is set when component type `i` is stored
pub type ArchetypeSignature = BitSet;

/// Index of an archetype in the world's archetype list
pub type ArchetypeId = usize;

/// The archetype with the empty signature. Always present at index 0.
pub const ROOT_ARCHETYPE: ArchetypeId = 0;

/// Type-erased component column.
///
/// Every row has a slot; a slot stays empty until a value is written, which
/// is how an entity can join an archetype before all its data is known.
pub trait Column: Any {
    /// Number of rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rust type of the stored values
    fn element_type_id(&self) -> TypeId;

    fn element_type_name(&self) -> &'static str;

    /// Append an empty slot
    fn push_empty(&mut self);

    /// Remove `row`, moving the last row into its place
    fn swap_remove(&mut self, row: usize);

    /// Whether `row` currently holds a value
    fn is_populated(&self, row: usize) -> bool;

    /// Whether `value` can be written to this column
    fn accepts(&self, value: &dyn Any) -> bool;

    /// Move the value out of `row`, leaving the slot empty
    fn take_boxed(&mut self, row: usize) -> Option<Box<dyn Any>>;

    /// Write a boxed value into an existing row
    fn set_boxed(&mut self, row: usize, value: Box<dyn Any>) -> Result<()>;

    fn get_any(&self, row: usize) -> Option<&dyn Any>;

    fn reserve(&mut self, additional: usize);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Column storing values of one component type
pub struct ComponentColumn<T> {
    slots: Vec<Option<T>>,
}

impl<T: Component> ComponentColumn<T> {
    /// Create new column for type T
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Get component at row
    pub fn get(&self, row: usize) -> Option<&T> {
        self.slots.get(row)?.as_ref()
    }

    /// Get mutable component at row
    pub fn get_mut(&mut self, row: usize) -> Option<&mut T> {
        self.slots.get_mut(row)?.as_mut()
    }

    /// Write `value` into an existing row, returning the previous value
    pub fn replace(&mut self, row: usize, value: T) -> Option<T> {
        self.slots.get_mut(row)?.replace(value)
    }

    pub fn take(&mut self, row: usize) -> Option<T> {
        self.slots.get_mut(row)?.take()
    }

    /// Raw slots, one per row
    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Option<T>] {
        &mut self.slots
    }
}

impl<T: Component> Default for ComponentColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> Column for ComponentColumn<T> {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn element_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn element_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn push_empty(&mut self) {
        self.slots.push(None);
    }

    fn swap_remove(&mut self, row: usize) {
        self.slots.swap_remove(row);
    }

    fn is_populated(&self, row: usize) -> bool {
        matches!(self.slots.get(row), Some(Some(_)))
    }

    fn accepts(&self, value: &dyn Any) -> bool {
        value.is::<T>()
    }

    fn take_boxed(&mut self, row: usize) -> Option<Box<dyn Any>> {
        self.take(row).map(|value| Box::new(value) as Box<dyn Any>)
    }

    fn set_boxed(&mut self, row: usize, value: Box<dyn Any>) -> Result<()> {
        let value = value
            .downcast::<T>()
            .map_err(|_| EcsError::ComponentTypeMismatch {
                expected: type_name::<T>(),
                found: "a different component type",
            })?;
        match self.slots.get_mut(row) {
            Some(slot) => {
                *slot = Some(*value);
                Ok(())
            }
            None => Err(EcsError::ComponentNotInArchetype(format!(
                "{} (row {row})",
                type_name::<T>()
            ))),
        }
    }

    fn get_any(&self, row: usize) -> Option<&dyn Any> {
        self.get(row).map(|value| value as &dyn Any)
    }

    fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Component values carried by an entity while it moves between archetypes.
#[derive(Default)]
pub struct ComponentSnapshot {
    values: SmallVec<[(ComponentTypeId, Box<dyn Any>); 8]>,
}

impl ComponentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a boxed value, replacing any previous value for `type_id`.
    pub fn insert(&mut self, type_id: ComponentTypeId, value: Box<dyn Any>) {
        match self.values.iter_mut().find(|(id, _)| *id == type_id) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((type_id, value)),
        }
    }

    pub fn insert_value<T: Component>(&mut self, type_id: ComponentTypeId, value: T) {
        self.insert(type_id, Box::new(value));
    }

    pub fn remove(&mut self, type_id: ComponentTypeId) -> Option<Box<dyn Any>> {
        let pos = self.values.iter().position(|(id, _)| *id == type_id)?;
        Some(self.values.swap_remove(pos).1)
    }

    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.values.iter().any(|(id, _)| *id == type_id)
    }

    pub fn get<T: Component>(&self, type_id: ComponentTypeId) -> Option<&T> {
        self.values
            .iter()
            .find(|(id, _)| *id == type_id)
            .and_then(|(_, value)| value.downcast_ref::<T>())
    }

    pub fn type_ids(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.values.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for ComponentSnapshot {
    type Item = (ComponentTypeId, Box<dyn Any>);
    type IntoIter = smallvec::IntoIter<[(ComponentTypeId, Box<dyn Any>); 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl fmt::Debug for ComponentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_ids()).finish()
    }
}

/// Archetype: Structure of Arrays storage
pub struct Archetype {
    id: ArchetypeId,
    signature: ArchetypeSignature,
    /// Ascending, parallel to `columns`
    type_ids: SmallVec<[ComponentTypeId; 8]>,
    /// Entity indices; dense slot == row
    members: SparseSet,
    /// Full handles in row order
    entities: Vec<Entity>,
    columns: Vec<Box<dyn Column>>,
    component_indices: FxHashMap<TypeId, usize>,
}

impl Archetype {
    /// Archetype with the empty signature.
    pub fn empty(id: ArchetypeId, capacity: usize) -> Self {
        Self {
            id,
            signature: ArchetypeSignature::new(),
            type_ids: SmallVec::new(),
            members: SparseSet::with_capacity(capacity),
            entities: Vec::new(),
            columns: Vec::new(),
            component_indices: FxHashMap::default(),
        }
    }

    /// Create an archetype storing exactly `type_ids`.
    ///
    /// Order and duplicates in `type_ids` are irrelevant. Every id must be
    /// registered in `registry`.
    pub fn new(
        id: ArchetypeId,
        type_ids: &[ComponentTypeId],
        registry: &ComponentRegistry,
    ) -> Result<Self> {
        Self::with_capacity(id, type_ids, registry, SparseSet::DEFAULT_CAPACITY)
    }

    /// Like [`Archetype::new`], sizing the member set for `capacity` entity indices.
    pub fn with_capacity(
        id: ArchetypeId,
        type_ids: &[ComponentTypeId],
        registry: &ComponentRegistry,
        capacity: usize,
    ) -> Result<Self> {
        let mut sorted: SmallVec<[ComponentTypeId; 8]> = type_ids.iter().copied().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut columns = Vec::with_capacity(sorted.len());
        let mut component_indices = FxHashMap::default();
        for (idx, &type_id) in sorted.iter().enumerate() {
            let descriptor = registry.descriptor(type_id)?;
            columns.push(descriptor.new_column());
            component_indices.insert(descriptor.type_id(), idx);
        }

        Ok(Self {
            id,
            signature: sorted.iter().map(|id| id.index()).collect(),
            type_ids: sorted,
            members: SparseSet::with_capacity(capacity),
            entities: Vec::new(),
            columns,
            component_indices,
        })
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Get signature
    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    /// Stored component types, ascending
    pub fn type_ids(&self) -> &[ComponentTypeId] {
        &self.type_ids
    }

    /// Get all entities, in row order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if archetype is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn has_entity(&self, entity: Entity) -> bool {
        self.row_of(entity).is_some()
    }

    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.signature.contains(type_id.index())
    }

    /// Whether a column for Rust type `T` exists here
    pub fn stores<T: Component>(&self) -> bool {
        self.component_indices.contains_key(&TypeId::of::<T>())
    }

    /// Row currently occupied by `entity`
    pub fn row_of(&self, entity: Entity) -> Option<usize> {
        let row = self.members.dense_index_of(entity.index())?;
        (self.entities[row] == entity).then_some(row)
    }

    /// Append `entity` with whatever values in `initial` this archetype stores.
    ///
    /// Values for types outside the signature are dropped. Slots without a
    /// value stay empty. Returns the new row.
    pub fn add_entity(&mut self, entity: Entity, initial: ComponentSnapshot) -> Result<usize> {
        if self.members.has(entity.index()) {
            return Err(EcsError::DuplicateEntity(entity));
        }

        let mut placed: SmallVec<[(usize, Box<dyn Any>); 8]> = SmallVec::new();
        for (type_id, value) in initial {
            match self.column_position(type_id) {
                Some(idx) => {
                    let column = &self.columns[idx];
                    if !column.accepts(value.as_ref()) {
                        return Err(EcsError::ComponentTypeMismatch {
                            expected: column.element_type_name(),
                            found: "a different component type",
                        });
                    }
                    placed.push((idx, value));
                }
                None => {
                    tracing::trace!(archetype = self.id, %type_id, "dropping value outside signature");
                }
            }
        }

        let row = self.entities.len();
        self.members.add(entity.index());
        self.entities.push(entity);
        for column in &mut self.columns {
            column.push_empty();
        }
        for (idx, value) in placed {
            self.columns[idx].set_boxed(row, value)?;
        }
        Ok(row)
    }

    /// Remove `entity` and drop its values.
    ///
    /// Returns the entity that was swapped into the vacated row, if any.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<Option<Entity>> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;

        self.members.swap_remove(entity.index());
        self.entities.swap_remove(row);
        for column in &mut self.columns {
            column.swap_remove(row);
        }

        Ok(self.entities.get(row).copied())
    }

    /// Move every populated value of `entity` out, leaving it a member with
    /// empty slots.
    pub fn take_components(&mut self, entity: Entity) -> Result<ComponentSnapshot> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        let mut snapshot = ComponentSnapshot::new();
        for (type_id, column) in self.type_ids.iter().zip(&mut self.columns) {
            if let Some(value) = column.take_boxed(row) {
                snapshot.insert(*type_id, value);
            }
        }
        Ok(snapshot)
    }

    /// Component `T` of `entity`, or `None` if not stored or not yet set.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<Option<&T>> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        Ok(self.get_column::<T>().and_then(|column| column.get(row)))
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<Option<&mut T>> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        Ok(self.get_column_mut::<T>().and_then(|column| column.get_mut(row)))
    }

    /// Type-erased read of one component by id.
    pub fn get_by_id(&self, entity: Entity, type_id: ComponentTypeId) -> Result<Option<&dyn Any>> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        Ok(self
            .column_position(type_id)
            .and_then(|idx| self.columns[idx].get_any(row)))
    }

    /// Write `value`, returning the value it replaced.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<Option<T>> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        let column = self
            .get_column_mut::<T>()
            .ok_or_else(|| EcsError::ComponentNotInArchetype(type_name::<T>().to_string()))?;
        Ok(column.replace(row, value))
    }

    /// Write a type-erased value into the column for `type_id`.
    pub fn set_boxed(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        value: Box<dyn Any>,
    ) -> Result<()> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        let idx = self
            .column_position(type_id)
            .ok_or_else(|| EcsError::ComponentNotInArchetype(type_id.to_string()))?;
        self.columns[idx].set_boxed(row, value)
    }

    /// Move component `T` out of `entity`'s row, leaving the slot empty.
    pub fn take<T: Component>(&mut self, entity: Entity) -> Result<Option<T>> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        Ok(self.get_column_mut::<T>().and_then(|column| column.take(row)))
    }

    /// Every stored type for `entity` with its value, if populated.
    pub fn components(
        &self,
        entity: Entity,
    ) -> Result<SmallVec<[(ComponentTypeId, Option<&dyn Any>); 8]>> {
        let row = self.row_of(entity).ok_or(EcsError::EntityNotFound(entity))?;
        Ok(self
            .type_ids
            .iter()
            .zip(&self.columns)
            .map(|(type_id, column)| (*type_id, column.get_any(row)))
            .collect())
    }

    /// Get column immutably
    pub fn get_column<T: Component>(&self) -> Option<&ComponentColumn<T>> {
        let idx = self.column_index(TypeId::of::<T>())?;
        self.columns[idx].as_any().downcast_ref()
    }

    /// Get column mutably
    pub fn get_column_mut<T: Component>(&mut self) -> Option<&mut ComponentColumn<T>> {
        let idx = self.column_index(TypeId::of::<T>())?;
        self.columns[idx].as_any_mut().downcast_mut()
    }

    /// Get column index for a Rust component type
    pub fn column_index(&self, type_id: TypeId) -> Option<usize> {
        self.component_indices.get(&type_id).copied()
    }

    /// Get column index for a registered component id
    pub fn column_position(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.type_ids.binary_search(&type_id).ok()
    }

    /// Split into the entity list and independently borrowable columns.
    pub fn split_columns(&mut self) -> (&[Entity], ColumnBorrows<'_>) {
        let columns = self
            .columns
            .iter_mut()
            .map(|column| (column.element_type_id(), column))
            .collect();
        (&self.entities, ColumnBorrows { columns })
    }

    /// Reserve space for additional rows
    pub fn reserve_rows(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("type_ids", &self.type_ids)
            .field("len", &self.entities.len())
            .finish()
    }
}

/// Mutable column borrows of one archetype, each handed out at most once.
pub struct ColumnBorrows<'a> {
    columns: SmallVec<[(TypeId, &'a mut Box<dyn Column>); 8]>,
}

impl<'a> ColumnBorrows<'a> {
    /// Take the column for `T`. Returns `None` if it is absent or already taken.
    pub fn take<T: Component>(&mut self) -> Option<&'a mut ComponentColumn<T>> {
        let pos = self
            .columns
            .iter()
            .position(|(type_id, _)| *type_id == TypeId::of::<T>())?;
        let (_, column) = self.columns.swap_remove(pos);
        let column: &'a mut dyn Column = &mut **column;
        column.as_any_mut().downcast_mut()
    }
}
