//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use signet_ecs::prelude::*;
//! ```

pub use crate::archetype::{Archetype, ArchetypeId, ArchetypeSignature};
pub use crate::bitset::BitSet;
pub use crate::command::CommandBuffer;
pub use crate::component::{Component, ComponentTypeId};
pub use crate::config::WorldConfig;
pub use crate::debug::WorldInspector;
pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::query::{Query, QueryBuilder};
pub use crate::system::System;
pub use crate::world::World;
