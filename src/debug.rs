use std::fmt;

use crate::archetype::ArchetypeId;
use crate::entity::Entity;
use crate::world::World;

/// World inspector for debugging
pub struct WorldInspector;

impl WorldInspector {
    /// Get total entity count
    pub fn entity_count(world: &World) -> usize {
        world.entity_count()
    }

    /// Get archetype summary
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        let registry = world.registry();
        world
            .archetypes()
            .iter()
            .map(|archetype| ArchetypeInfo {
                id: archetype.id(),
                signature: archetype.signature().to_string(),
                components: archetype
                    .type_ids()
                    .iter()
                    .map(|&id| {
                        registry
                            .descriptor(id)
                            .map(|d| short_name(d.name()).to_string())
                            .unwrap_or_else(|_| id.to_string())
                    })
                    .collect(),
                entity_count: archetype.len(),
            })
            .collect()
    }

    pub fn summary(world: &World) -> WorldSummary {
        WorldSummary {
            entity_count: world.entity_count(),
            component_types: world.registry().len(),
            systems: world.system_count(),
            pending_commands: world.pending_commands(),
            archetypes: Self::archetype_summary(world),
        }
    }

    /// Emit the summary as tracing events
    pub fn log_summary(world: &World) {
        let summary = Self::summary(world);
        tracing::info!(
            entities = summary.entity_count,
            archetypes = summary.archetypes.len(),
            component_types = summary.component_types,
            systems = summary.systems,
            pending_commands = summary.pending_commands,
            "world summary"
        );
        for info in &summary.archetypes {
            tracing::info!(
                archetype = info.id,
                entities = info.entity_count,
                components = ?info.components,
                "archetype"
            );
        }
    }

    /// Where an entity lives and what it carries
    pub fn entity_info(world: &World, entity: Entity) -> Option<EntityInfo> {
        let archetype_id = world.entity_archetype(entity)?;
        let archetype = world.archetype(archetype_id)?;
        let registry = world.registry();
        let components = archetype
            .components(entity)
            .ok()?
            .into_iter()
            .map(|(id, value)| {
                let name = registry
                    .descriptor(id)
                    .map(|d| short_name(d.name()).to_string())
                    .unwrap_or_else(|_| id.to_string());
                (name, value.is_some())
            })
            .collect();

        Some(EntityInfo {
            entity,
            archetype: archetype_id,
            row: archetype.row_of(entity)?,
            components,
        })
    }
}

/// Strip the module path from a type name
fn short_name(name: &'static str) -> &'static str {
    name.rsplit("::").next().unwrap_or(name)
}

/// Archetype information
#[derive(Debug, Clone)]
pub struct ArchetypeInfo {
    pub id: ArchetypeId,
    /// Hex dump of the signature
    pub signature: String,
    pub components: Vec<String>,
    pub entity_count: usize,
}

/// Entity information
#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub entity: Entity,
    pub archetype: ArchetypeId,
    pub row: usize,
    /// Component name and whether its slot is populated
    pub components: Vec<(String, bool)>,
}

/// Snapshot of world-level counters
#[derive(Debug, Clone)]
pub struct WorldSummary {
    pub entity_count: usize,
    pub component_types: usize,
    pub systems: usize,
    pub pending_commands: usize,
    pub archetypes: Vec<ArchetypeInfo>,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== World Summary ===")?;
        writeln!(f, "Entities: {}", self.entity_count)?;
        writeln!(f, "Archetypes: {}", self.archetypes.len())?;
        writeln!(f, "Component types: {}", self.component_types)?;
        writeln!(f, "Systems: {}", self.systems)?;
        writeln!(f, "Pending commands: {}", self.pending_commands)?;
        writeln!(f)?;
        writeln!(f, "=== Archetypes ===")?;
        for info in &self.archetypes {
            writeln!(
                f,
                "Archetype {}: {} entities [{}]",
                info.id,
                info.entity_count,
                info.components.join(", ")
            )?;
        }
        Ok(())
    }
}
