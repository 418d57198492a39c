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

//! Component trait and the per-world component type registry
//!
//! Components are data attached to entities. Each distinct Rust type gets a
//! small integer [`ComponentTypeId`] the first time it is registered; that id
//! is the bit position used in archetype signatures.

use std::any::{type_name, Any, TypeId};
use std::fmt;

use rustc_hash::FxHashMap;

use crate::archetype::{Column, ComponentColumn};
use crate::error::{EcsError, Result};

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Stable integer id of a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Bit position of this type in a signature.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Builds an empty column for one component type.
pub type ColumnFactory = fn() -> Box<dyn Column>;

/// Builds a default instance of one component type.
pub type Fabricator = fn() -> Box<dyn Any>;

fn new_column<T: Component>() -> Box<dyn Column> {
    Box::new(ComponentColumn::<T>::new())
}

fn fabricate_default<T: Component + Default>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// Everything the world knows about a registered component type.
#[derive(Clone)]
pub struct ComponentDescriptor {
    id: ComponentTypeId,
    type_id: TypeId,
    name: &'static str,
    column_factory: ColumnFactory,
    fabricator: Option<Fabricator>,
}

impl ComponentDescriptor {
    pub fn id(&self) -> ComponentTypeId {
        self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fresh, empty storage column for this type.
    pub fn new_column(&self) -> Box<dyn Column> {
        (self.column_factory)()
    }

    pub fn has_fabricator(&self) -> bool {
        self.fabricator.is_some()
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_fabricator", &self.fabricator.is_some())
            .finish()
    }
}

/// Assigns ids to component types and remembers how to build their columns.
///
/// Ids are handed out from zero in registration order and never reused;
/// there is no way to unregister a type.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    descriptors: Vec<ComponentDescriptor>,
    by_type: FxHashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning its existing id if already registered.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        self.register_with(TypeId::of::<T>(), type_name::<T>(), new_column::<T>, None)
    }

    /// Register `T` together with a fabricator for [`ComponentRegistry::create_default`].
    ///
    /// A type already registered through [`ComponentRegistry::register`] keeps
    /// its id and gains the fabricator.
    pub fn register_default<T: Component + Default>(&mut self) -> ComponentTypeId {
        self.register_with(
            TypeId::of::<T>(),
            type_name::<T>(),
            new_column::<T>,
            Some(fabricate_default::<T> as Fabricator),
        )
    }

    fn register_with(
        &mut self,
        type_id: TypeId,
        name: &'static str,
        column_factory: ColumnFactory,
        fabricator: Option<Fabricator>,
    ) -> ComponentTypeId {
        if let Some(&id) = self.by_type.get(&type_id) {
            let descriptor = &mut self.descriptors[id.index()];
            if descriptor.fabricator.is_none() {
                descriptor.fabricator = fabricator;
            }
            return id;
        }

        let raw = u32::try_from(self.descriptors.len())
            .unwrap_or_else(|_| panic!("Component type id exhaustion at {name}"));
        let id = ComponentTypeId::new(raw);
        self.descriptors.push(ComponentDescriptor {
            id,
            type_id,
            name,
            column_factory,
            fabricator,
        });
        self.by_type.insert(type_id, id);
        tracing::debug!(component = name, %id, "registered component type");
        id
    }

    /// Id of `T`, failing if it was never registered.
    pub fn type_id_of<T: Component>(&self) -> Result<ComponentTypeId> {
        self.lookup(TypeId::of::<T>())
            .ok_or(EcsError::UnregisteredComponent(type_name::<T>()))
    }

    /// Id registered for a Rust `TypeId`, if any.
    pub fn lookup(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.by_type.get(&type_id).copied()
    }

    pub fn is_registered<T: Component>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn descriptor(&self, id: ComponentTypeId) -> Result<&ComponentDescriptor> {
        self.descriptors
            .get(id.index())
            .ok_or(EcsError::UnknownComponentTypeId(id))
    }

    /// Build a `T` from `args` after checking that `id` really names `T`.
    pub fn create_instance<T, A>(&self, id: ComponentTypeId, args: A) -> Result<T>
    where
        T: Component + From<A>,
    {
        let descriptor = self.descriptor(id)?;
        if descriptor.type_id != TypeId::of::<T>() {
            return Err(EcsError::ComponentTypeMismatch {
                expected: descriptor.name,
                found: type_name::<T>(),
            });
        }
        Ok(T::from(args))
    }

    /// Build a default instance of the type registered under `id`.
    pub fn create_default(&self, id: ComponentTypeId) -> Result<Box<dyn Any>> {
        let fabricate = self
            .descriptor(id)?
            .fabricator
            .ok_or(EcsError::MissingFabricator(id))?;
        Ok(fabricate())
    }

    /// Number of registered types; also the next id to be assigned.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComponentDescriptor> {
        self.descriptors.iter()
    }
}
