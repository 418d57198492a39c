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

//! Cross-module tests for entity lifecycle, migration and queries

#[cfg(test)]
mod tests {
    #![allow(clippy::module_inception)]
    use crate::{ArchetypeSignature, BitSet, CommandBuffer, EcsError, Entity, Result, World};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(u32);

    fn world() -> World {
        let mut world = World::new();
        world.register_component::<Position>();
        world.register_component::<Velocity>();
        world.register_component::<Health>();
        world
    }

    #[test]
    fn test_basic_create_destroy() -> Result<()> {
        let mut world = world();

        let entity = world.create_entity();
        world.add_component(entity, Position { x: 1.0, y: 2.0 })?;
        assert!(world.is_alive(entity));

        world.destroy_entity(entity)?;
        assert!(!world.is_alive(entity));

        // Double destroy should fail
        assert_eq!(world.destroy_entity(entity), Err(EcsError::InvalidEntity(entity)));
        Ok(())
    }

    #[test]
    fn test_id_reuse_rejects_old_handle() -> Result<()> {
        let mut world = world();
        let old = world.create_entity();
        world.add_component(old, Health(10))?;
        world.destroy_entity(old)?;

        let new = world.create_entity();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());

        assert_eq!(world.get_component::<Health>(old), None);
        assert_eq!(world.get_component::<Health>(new), None);
        assert_eq!(world.add_component(old, Health(1)), Err(EcsError::InvalidEntity(old)));
        Ok(())
    }

    #[test]
    fn test_migration_preserves_surviving_data() -> Result<()> {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 2.0 })?;
        world.add_component(e, Velocity { x: 3.0, y: 4.0 })?;
        world.add_component(e, Health(5))?;

        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
        assert_eq!(world.get_component::<Velocity>(e), Some(&Velocity { x: 3.0, y: 4.0 }));

        world.remove_component::<Velocity>(e)?;
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
        assert_eq!(world.get_component::<Health>(e), Some(&Health(5)));
        Ok(())
    }

    #[test]
    fn test_migration_drops_removed_data() -> Result<()> {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 2.0 })?;
        world.add_component(e, Velocity { x: 3.0, y: 4.0 })?;

        world.remove_component::<Velocity>(e)?;
        assert!(!world.has_component::<Velocity>(e));
        assert_eq!(world.get_component::<Velocity>(e), None);

        let archetype = world.archetype(world.entity_archetype(e).unwrap()).unwrap();
        assert_eq!(archetype.signature(), &BitSet::from_slice(&[0]));
        assert_eq!(archetype.components(e)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_migration_keeps_neighbours_intact() -> Result<()> {
        let mut world = world();
        let entities: Vec<Entity> = (0..5)
            .map(|i| {
                let e = world.create_entity();
                world
                    .add_component(e, Position { x: i as f32, y: 0.0 })
                    .map(|_| e)
            })
            .collect::<Result<_>>()?;

        // Pull the second entity out; the last one is swapped into its row
        world.add_component(entities[1], Health(1))?;

        for (i, &e) in entities.iter().enumerate() {
            assert_eq!(
                world.get_component::<Position>(e),
                Some(&Position { x: i as f32, y: 0.0 })
            );
        }
        Ok(())
    }

    #[test]
    fn test_each_signature_has_one_archetype() -> Result<()> {
        let mut world = world();
        for _ in 0..10 {
            let e = world.create_entity();
            world.add_component(e, Velocity { x: 0.0, y: 0.0 })?;
            world.add_component(e, Position { x: 0.0, y: 0.0 })?;
        }

        let signatures: Vec<&ArchetypeSignature> =
            world.archetypes().iter().map(|a| a.signature()).collect();
        for (i, a) in signatures.iter().enumerate() {
            for b in &signatures[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(world.archetype_count(), 3);
        Ok(())
    }

    #[test]
    fn test_end_to_end_movement() -> Result<()> {
        let mut world = world();
        let mut entities = Vec::new();
        for i in 0..5 {
            let e = world.create_entity();
            let seed = i as f32;
            world.add_component(e, Position { x: seed, y: seed })?;
            world.add_component(e, Velocity { x: 1.0, y: 2.0 })?;
            if i % 20 == 0 {
                world.add_component(e, Health(100))?;
            }
            entities.push(e);
        }

        let query = world
            .create_query()
            .with::<Position>()
            .with::<Velocity>()
            .without::<Health>()
            .build()?;
        assert_eq!(query.count(&world), 4);

        world.add_system_fn("movement", move |world: &mut World, dt: f32| {
            query.for_each_mut::<(&mut Position, &Velocity), _>(world, |_, (pos, vel)| {
                pos.x += vel.x * dt;
                pos.y += vel.y * dt;
            });
            Ok(())
        })?;
        world.update(0.5)?;

        // Entity 0 moved to {P,V,H}, swapping entity 4 into its old row
        assert_eq!(world.get_component::<Position>(entities[0]), Some(&Position { x: 0.0, y: 0.0 }));
        for (i, &e) in entities.iter().enumerate().skip(1) {
            let seed = i as f32;
            assert_eq!(
                world.get_component::<Position>(e),
                Some(&Position { x: seed + 0.5, y: seed + 1.0 })
            );
        }
        Ok(())
    }

    #[test]
    fn test_structural_changes_through_command_buffer() -> Result<()> {
        let mut world = world();
        for _ in 0..4 {
            let e = world.create_entity();
            world.add_component(e, Health(0))?;
        }

        let query = world.create_query().with::<Health>().build()?;
        let mut commands = CommandBuffer::new();
        query.for_each::<&Health, _>(&world, |entity, _| commands.despawn(entity));
        world.defer_commands(commands);
        assert_eq!(world.pending_commands(), 4);

        world.update(0.0)?;
        assert_eq!(world.entity_count(), 0);
        assert_eq!(query.count(&world), 0);
        Ok(())
    }
}
