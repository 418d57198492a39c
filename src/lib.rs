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

//! Signet ECS - archetype Entity Component System
//!
//! Entities with the same component set share an archetype, keyed by a bit
//! signature over registered component type ids. Adding or removing a
//! component migrates the entity between archetypes; queries cache the
//! archetypes matching an include/exclude pair.

pub mod archetype;
pub mod bitset;
pub mod command;
pub mod component;
pub mod config;
pub mod debug;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod query;
pub mod sparse_set;
pub mod system;
pub mod world;

#[cfg(test)]
mod tests;

pub use archetype::*;
pub use bitset::BitSet;
pub use command::*;
pub use component::*;
pub use config::WorldConfig;
pub use entity::*;
pub use error::*;
pub use query::*;
pub use sparse_set::{SparseSet, SwapRemoval};
pub use system::*;
pub use world::*;
