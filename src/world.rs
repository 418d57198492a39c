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

//! World: central entity and archetype storage

use std::any::TypeId;

use ahash::AHashMap;
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId, ArchetypeSignature, ComponentSnapshot, ROOT_ARCHETYPE};
use crate::command::CommandBuffer;
use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::config::WorldConfig;
use crate::entity::{Entity, EntityAllocator};
use crate::error::{EcsError, Result};
use crate::query::QueryBuilder;
use crate::system::{BoxedSystem, FnSystem, System};

/// Central ECS world
///
/// Owns the entity allocator, the component registry, every archetype, the
/// registered systems and the deferred command queue. Every live entity sits
/// in exactly one archetype whose signature equals its component set.
pub struct World {
    allocator: EntityAllocator,

    registry: ComponentRegistry,

    /// All archetypes; index 0 is the empty signature
    archetypes: Vec<Archetype>,

    /// Maps component signatures to archetype indices
    archetype_index: AHashMap<ArchetypeSignature, ArchetypeId>,

    /// Current archetype per entity index; `None` for freed indices
    entity_archetypes: Vec<Option<ArchetypeId>>,

    systems: Vec<BoxedSystem>,

    /// Registered system names, kept while `update` has the systems out
    system_names: Vec<String>,

    /// Structural changes waiting for the end of the tick
    deferred: CommandBuffer,

    config: WorldConfig,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Create a world with explicit settings.
    pub fn with_config(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        let mut world = Self {
            allocator: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            archetypes: Vec::with_capacity(config.archetype_reserve),
            archetype_index: AHashMap::with_capacity(config.archetype_reserve),
            entity_archetypes: Vec::new(),
            systems: Vec::new(),
            system_names: Vec::new(),
            deferred: CommandBuffer::new(),
            config,
        };

        // Bootstrap the empty archetype (entities with no components)
        let root = Archetype::empty(ROOT_ARCHETYPE, world.config.archetype_capacity);
        world
            .archetype_index
            .insert(root.signature().clone(), ROOT_ARCHETYPE);
        world.archetypes.push(root);
        world
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ========== Components ==========

    /// Register a component type, returning its id
    pub fn register_component<T: Component>(&mut self) -> ComponentTypeId {
        self.registry.register::<T>()
    }

    /// Register a component type that can be added by id with its default value
    pub fn register_default_component<T: Component + Default>(&mut self) -> ComponentTypeId {
        self.registry.register_default::<T>()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // ========== Entities ==========

    /// Create an entity with no components
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.create();
        let index = entity.index() as usize;
        if index >= self.entity_archetypes.len() {
            self.entity_archetypes.resize(index + 1, None);
        }

        // A freed index left its archetype in `destroy_entity` before the
        // allocator could hand it out again, so the root never holds it
        if let Err(err) = self.archetypes[ROOT_ARCHETYPE].add_entity(entity, ComponentSnapshot::new()) {
            tracing::error!(%entity, error = %err, "allocator returned an index still in use");
        }
        self.entity_archetypes[index] = Some(ROOT_ARCHETYPE);
        entity
    }

    /// Destroy entity immediately, dropping all its components
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        let archetype_id = self.location(entity)?;
        self.archetypes[archetype_id].remove_entity(entity)?;
        self.entity_archetypes[entity.index() as usize] = None;
        self.allocator.destroy(entity);
        tracing::trace!(%entity, archetype = archetype_id, "destroyed entity");
        Ok(())
    }

    /// Check if an entity is alive
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_valid(entity)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Archetype currently holding `entity`
    pub fn entity_archetype(&self, entity: Entity) -> Option<ArchetypeId> {
        if !self.allocator.is_valid(entity) {
            return None;
        }
        self.entity_archetypes
            .get(entity.index() as usize)
            .copied()
            .flatten()
    }

    fn location(&self, entity: Entity) -> Result<ArchetypeId> {
        self.entity_archetype(entity)
            .ok_or(EcsError::InvalidEntity(entity))
    }

    /// Get immutable reference to a component on an entity
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let archetype_id = self.entity_archetype(entity)?;
        self.archetypes[archetype_id].get::<T>(entity).ok().flatten()
    }

    /// Get mutable reference to a component on an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let archetype_id = self.entity_archetype(entity)?;
        self.archetypes[archetype_id]
            .get_mut::<T>(entity)
            .ok()
            .flatten()
    }

    /// Check if entity has a specific component
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match self.entity_archetype(entity) {
            Some(archetype_id) => self.archetypes[archetype_id].stores::<T>(),
            None => false,
        }
    }

    /// Add a component to an entity
    ///
    /// Overwrites the value in place if the entity already has `T`; otherwise
    /// the entity migrates to the archetype with `T` added.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        let current = self.location(entity)?;
        let type_id = self.registry.type_id_of::<T>()?;

        if self.archetypes[current].has_component(type_id) {
            self.archetypes[current].set(entity, component)?;
            return Ok(());
        }

        let target_signature = self.archetypes[current].signature().with(type_id.index());
        let target = self.find_or_create_archetype(&target_signature)?;
        self.move_entity(entity, target)?;
        self.archetypes[target].set(entity, component)?;
        Ok(())
    }

    /// Add the registered default value of component `type_id`
    pub fn add_default_component(&mut self, entity: Entity, type_id: ComponentTypeId) -> Result<()> {
        let current = self.location(entity)?;
        let value = self.registry.create_default(type_id)?;

        let target = if self.archetypes[current].has_component(type_id) {
            current
        } else {
            let signature = self.archetypes[current].signature().with(type_id.index());
            let target = self.find_or_create_archetype(&signature)?;
            self.move_entity(entity, target)?;
            target
        };
        self.archetypes[target].set_boxed(entity, type_id, value)
    }

    /// Remove a component from an entity, returning it
    ///
    /// Returns `Ok(None)` if the entity does not have `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<Option<T>> {
        let current = self.location(entity)?;
        let Some(type_id) = self.registry.lookup(TypeId::of::<T>()) else {
            return Ok(None);
        };
        if !self.archetypes[current].has_component(type_id) {
            return Ok(None);
        }

        // Resolve the target first so a refused migration leaves the value in place
        let target_signature = self.archetypes[current].signature().without(type_id.index());
        let target = self.find_or_create_archetype(&target_signature)?;
        let value = self.archetypes[current].take::<T>(entity)?;
        self.move_entity(entity, target)?;
        Ok(value)
    }

    /// Move `entity` to archetype `target`, carrying over the values its
    /// signature keeps and dropping the rest
    pub fn move_entity(&mut self, entity: Entity, target: ArchetypeId) -> Result<()> {
        let source = self.location(entity)?;
        if target >= self.archetypes.len() {
            return Err(EcsError::UnknownArchetype(target));
        }
        if source == target {
            return Ok(());
        }

        let snapshot = self.archetypes[source].take_components(entity)?;
        self.archetypes[source].remove_entity(entity)?;
        self.archetypes[target].add_entity(entity, snapshot)?;
        self.entity_archetypes[entity.index() as usize] = Some(target);

        tracing::trace!(%entity, from = source, to = target, "migrated entity");
        Ok(())
    }

    // ========== Archetypes ==========

    /// Archetype whose signature equals `signature` exactly
    pub fn find_archetype(&self, signature: &ArchetypeSignature) -> Option<ArchetypeId> {
        self.archetype_index.get(signature).copied()
    }

    /// First archetype, in creation order, storing every type in `type_ids`
    pub fn find_archetype_containing(&self, type_ids: &[ComponentTypeId]) -> Option<ArchetypeId> {
        self.archetypes
            .iter()
            .find(|archetype| type_ids.iter().all(|&id| archetype.has_component(id)))
            .map(Archetype::id)
    }

    /// Get or create the archetype for `signature`
    pub fn find_or_create_archetype(&mut self, signature: &ArchetypeSignature) -> Result<ArchetypeId> {
        if let Some(&id) = self.archetype_index.get(signature) {
            return Ok(id);
        }

        // Prevent archetype explosion
        if self.archetypes.len() >= self.config.max_archetypes {
            tracing::warn!(
                limit = self.config.max_archetypes,
                %signature,
                "archetype limit reached"
            );
            return Err(EcsError::ArchetypeLimitExceeded(self.config.max_archetypes));
        }

        let type_ids: SmallVec<[ComponentTypeId; 8]> = signature
            .ones()
            .map(|bit| ComponentTypeId::new(bit as u32))
            .collect();
        let id = self.archetypes.len();
        let archetype = Archetype::with_capacity(
            id,
            &type_ids,
            &self.registry,
            self.config.archetype_capacity,
        )?;

        self.archetype_index.insert(archetype.signature().clone(), id);
        self.archetypes.push(archetype);
        tracing::debug!(archetype = id, components = type_ids.len(), "created archetype");
        Ok(id)
    }

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// All archetypes in creation order
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub(crate) fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    // ========== Queries ==========

    /// Start building a query against this world's component types
    pub fn create_query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    // ========== Systems and deferred commands ==========

    /// Register a system; systems run in registration order
    ///
    /// The system's `init` runs before it is stored. Fails with
    /// `DuplicateSystem` if a system of the same name is registered, and
    /// with `init`'s error, in which case the system is dropped.
    pub fn add_system<S: System + 'static>(&mut self, mut system: S) -> Result<()> {
        let name = system.name().to_string();
        if self.has_system(&name) {
            return Err(EcsError::DuplicateSystem(name));
        }

        system.init(self)?;
        tracing::debug!(system = %name, "registered system");
        self.system_names.push(name);
        self.systems.push(Box::new(system));
        Ok(())
    }

    /// Register a closure as a system
    pub fn add_system_fn<F>(&mut self, name: impl Into<String>, func: F) -> Result<()>
    where
        F: FnMut(&mut World, f32) -> Result<()> + 'static,
    {
        self.add_system(FnSystem::new(name, func))
    }

    /// Number of registered systems, including those running in `update`
    pub fn system_count(&self) -> usize {
        self.system_names.len()
    }

    pub fn has_system(&self, name: &str) -> bool {
        self.system_names.iter().any(|registered| registered == name)
    }

    /// Shut down and unregister every system, in registration order
    ///
    /// Every system's `shutdown` runs even if an earlier one fails; the first
    /// error is returned. Call this outside `update`.
    pub fn shutdown_systems(&mut self) -> Result<()> {
        let mut systems = std::mem::take(&mut self.systems);
        self.system_names.clear();

        let mut outcome = Ok(());
        for system in systems.iter_mut() {
            if let Err(err) = system.shutdown(self) {
                tracing::warn!(system = system.name(), error = %err, "system shutdown failed");
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        tracing::debug!(systems = systems.len(), "shut down systems");
        outcome
    }

    /// Queue a structural change for the end of the current tick
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + 'static,
    {
        self.deferred.add(f);
    }

    /// Queue every command in `buffer`, preserving order
    pub fn defer_commands(&mut self, mut buffer: CommandBuffer) {
        self.deferred.append(&mut buffer);
    }

    /// Number of queued deferred commands
    pub fn pending_commands(&self) -> usize {
        self.deferred.len()
    }

    /// Run queued commands in enqueue order until the queue is empty
    ///
    /// Commands queued while draining run in the same drain, after everything
    /// queued before them. If a command fails, the drain stops, every command
    /// still queued is discarded and the error is returned.
    pub fn apply_deferred(&mut self) -> Result<()> {
        if self.deferred.is_empty() {
            return Ok(());
        }

        #[cfg(feature = "profiling")]
        let span = info_span!("world.apply_deferred", queued = self.deferred.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut applied = 0;
        while !self.deferred.is_empty() {
            let mut batch = std::mem::take(&mut self.deferred);
            let queued = batch.len();
            if let Err(err) = batch.apply(self) {
                let discarded = self.deferred.len();
                self.deferred.clear();
                tracing::debug!(applied, discarded, error = %err, "deferred command failed");
                return Err(err);
            }
            applied += queued;
        }

        tracing::debug!(applied, "drained deferred queue");
        Ok(())
    }

    /// Run one tick: every system in order, then the deferred queue
    ///
    /// If a system fails, the remaining systems are skipped, the deferred
    /// queue is discarded and the error is returned.
    pub fn update(&mut self, delta_time: f32) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.update", systems = self.systems.len(), delta_time);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut systems = std::mem::take(&mut self.systems);
        let mut outcome = Ok(());
        for system in systems.iter_mut() {
            #[cfg(feature = "profiling")]
            let system_span = info_span!("system.run", system = system.name());
            #[cfg(feature = "profiling")]
            let _system_guard = system_span.enter();

            if let Err(err) = system.run(self, delta_time) {
                tracing::warn!(system = system.name(), error = %err, "system failed, aborting tick");
                outcome = Err(err);
                break;
            }
        }

        // Systems registered during the tick go after the existing ones
        let added = std::mem::replace(&mut self.systems, systems);
        self.systems.extend(added);

        if let Err(err) = outcome {
            let discarded = self.deferred.len();
            self.deferred.clear();
            tracing::debug!(discarded, "discarded deferred queue");
            return Err(err);
        }

        self.apply_deferred()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("archetypes", &self.archetypes.len())
            .field("components", &self.registry.len())
            .field("systems", &self.system_names.len())
            .field("pending_commands", &self.deferred.len())
            .finish()
    }
}
