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

//! Deferred world mutations
//!
//! Structural changes requested while systems or queries hold the world are
//! queued here and applied afterwards, in the order they were queued.

use crate::component::Component;
use crate::entity::Entity;
use crate::error::Result;
use crate::world::World;

/// Type alias for world mutation closures
pub type CommandClosure = Box<dyn FnOnce(&mut World) -> Result<()>>;

/// Closure run against a freshly created entity
pub type SpawnClosure = Box<dyn FnOnce(&mut World, Entity) -> Result<()>>;

/// Deferred command for world mutations
pub enum Command {
    /// Create an entity, then configure it
    Spawn(SpawnClosure),

    /// Destroy entity
    Despawn(Entity),

    /// Custom world mutation
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Spawn(_) => write!(f, "Spawn(...)"),
            Command::Despawn(e) => f.debug_tuple("Despawn").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

impl Command {
    /// Apply this command to the world
    pub fn apply(self, world: &mut World) -> Result<()> {
        match self {
            Command::Spawn(f) => {
                let entity = world.create_entity();
                f(world, entity)
            }
            Command::Despawn(entity) => world.destroy_entity(entity),
            Command::Custom(f) => f(world),
        }
    }
}

/// Command buffer for deferred operations
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create new command buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Queue creation of an entity, configured by `f`
    pub fn spawn<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World, Entity) -> Result<()> + 'static,
    {
        self.commands.push(Command::Spawn(Box::new(f)));
    }

    /// Queue despawn command
    pub fn despawn(&mut self, entity: Entity) {
        self.commands.push(Command::Despawn(entity));
    }

    /// Queue a custom world mutation
    pub fn add<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + 'static,
    {
        self.commands.push(Command::Custom(Box::new(f)));
    }

    /// Queue add component command
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        self.add(move |world| world.add_component(entity, component));
    }

    /// Queue remove component command
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.add(move |world| world.remove_component::<T>(entity).map(|_| ()));
    }

    /// Append every command of `other`, preserving order
    pub fn append(&mut self, other: &mut CommandBuffer) {
        self.commands.append(&mut other.commands);
    }

    /// Apply all commands to the world and clear the buffer
    ///
    /// Stops at the first failing command; the rest are dropped.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        for command in std::mem::take(&mut self.commands) {
            command.apply(world)?;
        }
        Ok(())
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.commands).finish()
    }
}

impl IntoIterator for CommandBuffer {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}
