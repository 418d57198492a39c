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

//! Query system with archetype filtering
//!
//! A [`Query`] is an include/exclude signature pair plus the list of
//! archetypes that matched when it was last evaluated. Build one with
//! [`World::create_query`], then iterate it any number of times:
//!
//! ```
//! use signet_ecs::prelude::*;
//!
//! struct Position(f32);
//! struct Velocity(f32);
//!
//! let mut world = World::new();
//! world.register_component::<Position>();
//! world.register_component::<Velocity>();
//!
//! let e = world.create_entity();
//! world.add_component(e, Position(0.0)).unwrap();
//! world.add_component(e, Velocity(2.0)).unwrap();
//!
//! let query = world
//!     .create_query()
//!     .with::<Position>()
//!     .with::<Velocity>()
//!     .build()
//!     .unwrap();
//!
//! for (_entity, (pos, vel)) in query.iter_mut::<(&mut Position, &Velocity)>(&mut world) {
//!     pos.0 += vel.0;
//! }
//! assert_eq!(world.get_component::<Position>(e).unwrap().0, 2.0);
//! ```

use std::slice;

use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId, ArchetypeSignature, ColumnBorrows, ComponentColumn};
use crate::bitset::BitSet;
use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

const MAX_FILTER_COMPONENTS: usize = 8;

/// Accumulates the include and exclude sets of a [`Query`]
pub struct QueryBuilder<'w> {
    world: &'w World,
    include: BitSet,
    exclude: BitSet,
    requested: SmallVec<[ComponentTypeId; MAX_FILTER_COMPONENTS]>,
    error: Option<EcsError>,
}

impl<'w> QueryBuilder<'w> {
    pub fn new(world: &'w World) -> Self {
        let bits = world.config().signature_bits;
        Self {
            world,
            include: BitSet::with_capacity(bits),
            exclude: BitSet::with_capacity(bits),
            requested: SmallVec::new(),
            error: None,
        }
    }

    /// Require component `T`
    pub fn with<T: Component>(self) -> Self {
        match self.world.registry().type_id_of::<T>() {
            Ok(id) => self.with_id(id),
            Err(err) => self.fail(err),
        }
    }

    /// Reject archetypes storing component `T`
    pub fn without<T: Component>(self) -> Self {
        match self.world.registry().type_id_of::<T>() {
            Ok(id) => self.without_id(id),
            Err(err) => self.fail(err),
        }
    }

    /// Require a component by registered id
    pub fn with_id(mut self, id: ComponentTypeId) -> Self {
        self.include.set(id.index());
        if !self.requested.contains(&id) {
            self.requested.push(id);
        }
        self
    }

    pub fn without_id(mut self, id: ComponentTypeId) -> Self {
        self.exclude.set(id.index());
        self
    }

    fn fail(mut self, err: EcsError) -> Self {
        self.error.get_or_insert(err);
        self
    }

    /// Snapshot both sets and match them against the current archetypes
    ///
    /// Fails with the first error recorded while building, e.g. an
    /// unregistered component type.
    pub fn build(self) -> Result<Query> {
        if let Some(err) = self.error {
            return Err(err);
        }

        #[cfg(feature = "profiling")]
        let span = info_span!(
            "query.build",
            archetype_count = self.world.archetype_count()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut query = Query {
            include: self.include,
            exclude: self.exclude,
            requested: self.requested,
            matched_archetypes: Vec::new(),
            last_archetype_count: 0,
        };
        query.refresh(self.world);
        Ok(query)
    }
}

/// Cached archetype match for one include/exclude pair
///
/// The match list is computed when the query is built and extended by
/// [`Query::refresh`]; archetypes created afterwards are invisible until then.
#[derive(Debug, Clone)]
pub struct Query {
    include: ArchetypeSignature,
    exclude: ArchetypeSignature,
    requested: SmallVec<[ComponentTypeId; MAX_FILTER_COMPONENTS]>,
    matched_archetypes: Vec<ArchetypeId>,
    last_archetype_count: usize,
}

impl Query {
    /// Whether an archetype with `signature` belongs to this query
    pub fn matches(&self, signature: &ArchetypeSignature) -> bool {
        self.include.is_subset_of(signature) && self.exclude.is_disjoint(signature)
    }

    /// Test archetypes created since the last evaluation (incremental)
    pub fn refresh(&mut self, world: &World) {
        #[cfg(feature = "profiling")]
        let span = info_span!(
            "query.refresh",
            archetype_count = world.archetype_count()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let current_count = world.archetype_count();
        if current_count <= self.last_archetype_count {
            return;
        }
        for archetype in &world.archetypes()[self.last_archetype_count..] {
            if self.matches(archetype.signature()) {
                self.matched_archetypes.push(archetype.id());
            }
        }
        self.last_archetype_count = current_count;
    }

    /// Whether `world` has archetypes this query has not been tested against
    pub fn is_stale(&self, world: &World) -> bool {
        world.archetype_count() != self.last_archetype_count
    }

    /// Number of entities across matched archetypes
    ///
    /// This is the match count, independent of any fetch. Iterating with a
    /// fetch that reads types outside `with` yields fewer items: archetypes
    /// lacking a fetched column are skipped.
    pub fn count(&self, world: &World) -> usize {
        self.matched_archetypes
            .iter()
            .filter_map(|&id| world.archetype(id))
            .map(Archetype::len)
            .sum()
    }

    /// Matched archetypes, ascending
    pub fn matched_archetypes(&self) -> &[ArchetypeId] {
        &self.matched_archetypes
    }

    pub fn include(&self) -> &ArchetypeSignature {
        &self.include
    }

    pub fn exclude(&self) -> &ArchetypeSignature {
        &self.exclude
    }

    /// Component ids passed to `with`, in call order
    pub fn requested_types(&self) -> &[ComponentTypeId] {
        &self.requested
    }

    /// Iterate `(entity, components)` over matched archetypes
    ///
    /// Archetypes without every column `F` reads are skipped, so only a
    /// fetch over types passed to `with` visits all [`Query::count`] entities.
    pub fn iter<'w, F: QueryFetch<'w>>(&self, world: &'w World) -> QueryIter<'w, F> {
        let archetypes: Vec<&'w Archetype> = self
            .matched_archetypes
            .iter()
            .filter_map(|&id| world.archetype(id))
            .collect();
        QueryIter {
            archetypes: archetypes.into_iter(),
            current: None,
        }
    }

    /// Iterate with mutable component access
    pub fn iter_mut<'w, F: QueryFetchMut<'w>>(&self, world: &'w mut World) -> QueryIterMut<'w, F> {
        let matched = &self.matched_archetypes;
        let archetypes: Vec<&'w mut Archetype> = world
            .archetypes_mut()
            .iter_mut()
            .filter(|archetype| matched.binary_search(&archetype.id()).is_ok())
            .collect();
        QueryIterMut {
            archetypes: archetypes.into_iter(),
            current: None,
        }
    }

    pub fn for_each<'w, F, Func>(&self, world: &'w World, mut func: Func)
    where
        F: QueryFetch<'w>,
        Func: FnMut(Entity, F::Item),
    {
        for (entity, item) in self.iter::<F>(world) {
            func(entity, item);
        }
    }

    pub fn for_each_mut<'w, F, Func>(&self, world: &'w mut World, mut func: Func)
    where
        F: QueryFetchMut<'w>,
        Func: FnMut(Entity, F::Item),
    {
        for (entity, item) in self.iter_mut::<F>(world) {
            func(entity, item);
        }
    }
}

/// Trait for fetching component data (immutable)
///
/// `fetch` advances one row: `None` once the archetype is exhausted,
/// `Some(None)` for a row whose slot is empty.
pub trait QueryFetch<'w> {
    /// The type of data returned by the query
    type Item;
    /// Per-archetype cursor
    type State;

    /// Prepare to fetch from an archetype
    fn prepare(archetype: &'w Archetype) -> Option<Self::State>;

    /// Fetch the next row
    fn fetch(state: &mut Self::State) -> Option<Option<Self::Item>>;
}

impl<'w, T: Component> QueryFetch<'w> for &'w T {
    type Item = &'w T;
    type State = slice::Iter<'w, Option<T>>;

    fn prepare(archetype: &'w Archetype) -> Option<Self::State> {
        Some(archetype.get_column::<T>()?.slots().iter())
    }

    fn fetch(state: &mut Self::State) -> Option<Option<Self::Item>> {
        state.next().map(Option::as_ref)
    }
}

/// Trait for fetching component data (mutable)
///
/// Each column is handed out once per archetype, so a fetch naming the same
/// type twice matches nothing.
pub trait QueryFetchMut<'w> {
    /// The type of data returned by the query
    type Item;
    /// Per-archetype cursor
    type State;

    /// Prepare to fetch from an archetype's columns
    fn prepare(columns: &mut ColumnBorrows<'w>) -> Option<Self::State>;

    /// Fetch the next row
    fn fetch(state: &mut Self::State) -> Option<Option<Self::Item>>;
}

impl<'w, T: Component> QueryFetchMut<'w> for &'w mut T {
    type Item = &'w mut T;
    type State = slice::IterMut<'w, Option<T>>;

    fn prepare(columns: &mut ColumnBorrows<'w>) -> Option<Self::State> {
        Some(columns.take::<T>()?.slots_mut().iter_mut())
    }

    fn fetch(state: &mut Self::State) -> Option<Option<Self::Item>> {
        state.next().map(Option::as_mut)
    }
}

/// Read-only access inside a mutable query, e.g. `(&mut Position, &Velocity)`
impl<'w, T: Component> QueryFetchMut<'w> for &'w T {
    type Item = &'w T;
    type State = slice::Iter<'w, Option<T>>;

    fn prepare(columns: &mut ColumnBorrows<'w>) -> Option<Self::State> {
        let column: &'w ComponentColumn<T> = columns.take::<T>()?;
        Some(column.slots().iter())
    }

    fn fetch(state: &mut Self::State) -> Option<Option<Self::Item>> {
        state.next().map(Option::as_ref)
    }
}

macro_rules! impl_query_fetch_tuple {
    ($($name:ident),+) => {
        impl<'w, $($name: QueryFetch<'w>),+> QueryFetch<'w> for ($($name,)+) {
            type Item = ($($name::Item,)+);
            type State = ($($name::State,)+);

            fn prepare(archetype: &'w Archetype) -> Option<Self::State> {
                Some(($($name::prepare(archetype)?,)+))
            }

            #[allow(non_snake_case)]
            fn fetch(state: &mut Self::State) -> Option<Option<Self::Item>> {
                let ($($name,)+) = state;
                $(let $name = $name::fetch($name)?;)+
                match ($($name,)+) {
                    ($(Some($name),)+) => Some(Some(($($name,)+))),
                    _ => Some(None),
                }
            }
        }

        impl<'w, $($name: QueryFetchMut<'w>),+> QueryFetchMut<'w> for ($($name,)+) {
            type Item = ($($name::Item,)+);
            type State = ($($name::State,)+);

            fn prepare(columns: &mut ColumnBorrows<'w>) -> Option<Self::State> {
                Some(($($name::prepare(columns)?,)+))
            }

            #[allow(non_snake_case)]
            fn fetch(state: &mut Self::State) -> Option<Option<Self::Item>> {
                let ($($name,)+) = state;
                $(let $name = $name::fetch($name)?;)+
                match ($($name,)+) {
                    ($(Some($name),)+) => Some(Some(($($name,)+))),
                    _ => Some(None),
                }
            }
        }
    };
}

impl_query_fetch_tuple!(A, B);
impl_query_fetch_tuple!(A, B, C);
impl_query_fetch_tuple!(A, B, C, D);
impl_query_fetch_tuple!(A, B, C, D, E);
impl_query_fetch_tuple!(A, B, C, D, E, F);

/// Immutable query iterator
pub struct QueryIter<'w, F: QueryFetch<'w>> {
    archetypes: std::vec::IntoIter<&'w Archetype>,
    current: Option<(slice::Iter<'w, Entity>, F::State)>,
}

impl<'w, F: QueryFetch<'w>> Iterator for QueryIter<'w, F> {
    type Item = (Entity, F::Item);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((entities, state)) = self.current.as_mut() {
                if let Some(&entity) = entities.next() {
                    if let Some(slot) = F::fetch(state) {
                        match slot {
                            Some(item) => return Some((entity, item)),
                            None => continue,
                        }
                    }
                }
            }

            let archetype = self.archetypes.next()?;
            self.current = F::prepare(archetype).map(|state| (archetype.entities().iter(), state));
        }
    }
}

/// Mutable query iterator
pub struct QueryIterMut<'w, F: QueryFetchMut<'w>> {
    archetypes: std::vec::IntoIter<&'w mut Archetype>,
    current: Option<(slice::Iter<'w, Entity>, F::State)>,
}

impl<'w, F: QueryFetchMut<'w>> Iterator for QueryIterMut<'w, F> {
    type Item = (Entity, F::Item);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((entities, state)) = self.current.as_mut() {
                if let Some(&entity) = entities.next() {
                    if let Some(slot) = F::fetch(state) {
                        match slot {
                            Some(item) => return Some((entity, item)),
                            None => continue,
                        }
                    }
                }
            }

            let archetype = self.archetypes.next()?;
            let (entities, mut columns) = archetype.split_columns();
            self.current = F::prepare(&mut columns).map(|state| (entities.iter(), state));
        }
    }
}

impl std::fmt::Debug for QueryBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("include", &self.include.to_vec())
            .field("exclude", &self.exclude.to_vec())
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(f32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(f32);
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
    fn test_unregistered_type_fails_build() {
        struct Unknown;
        let world = world();
        let result = world.create_query().with::<Position>().without::<Unknown>().build();
        assert!(matches!(result, Err(EcsError::UnregisteredComponent(_))));
    }

    #[test]
    fn test_matches_include_and_exclude() -> Result<()> {
        let mut world = world();
        let moving = world.create_entity();
        world.add_component(moving, Position(0.0))?;
        world.add_component(moving, Velocity(1.0))?;
        let wounded = world.create_entity();
        world.add_component(wounded, Position(0.0))?;
        world.add_component(wounded, Velocity(1.0))?;
        world.add_component(wounded, Health(3))?;

        let query = world
            .create_query()
            .with::<Position>()
            .with::<Velocity>()
            .without::<Health>()
            .build()?;

        assert_eq!(query.count(&world), 1);
        let seen: Vec<Entity> = query.iter::<&Position>(&world).map(|(e, _)| e).collect();
        assert_eq!(seen, vec![moving]);
        Ok(())
    }

    #[test]
    fn test_staleness_and_refresh() -> Result<()> {
        let mut world = world();
        let mut query = world.create_query().with::<Position>().build()?;
        assert_eq!(query.count(&world), 0);

        let e = world.create_entity();
        world.add_component(e, Position(1.0))?;
        assert!(query.is_stale(&world));
        assert_eq!(query.count(&world), 0);

        query.refresh(&world);
        assert!(!query.is_stale(&world));
        assert_eq!(query.count(&world), 1);
        assert_eq!(query.matched_archetypes(), &[world.entity_archetype(e).unwrap()]);
        Ok(())
    }

    #[test]
    fn test_iteration_is_restartable() -> Result<()> {
        let mut world = world();
        for i in 0..3 {
            let e = world.create_entity();
            world.add_component(e, Position(i as f32))?;
        }
        let query = world.create_query().with::<Position>().build()?;

        let first: Vec<f32> = query.iter::<&Position>(&world).map(|(_, p)| p.0).collect();
        let second: Vec<f32> = query.iter::<&Position>(&world).map(|(_, p)| p.0).collect();
        assert_eq!(first, vec![0.0, 1.0, 2.0]);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_iter_mut_writes_through() -> Result<()> {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, Position(1.0))?;
        world.add_component(e, Velocity(0.5))?;

        let query = world.create_query().with::<Position>().with::<Velocity>().build()?;
        query.for_each_mut::<(&mut Position, &Velocity), _>(&mut world, |_, (pos, vel)| {
            pos.0 += vel.0;
        });
        assert_eq!(world.get_component::<Position>(e), Some(&Position(1.5)));
        Ok(())
    }

    #[test]
    fn test_same_column_twice_matches_nothing() -> Result<()> {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, Position(1.0))?;
        let query = world.create_query().with::<Position>().build()?;

        assert_eq!(query.iter_mut::<(&mut Position, &mut Position)>(&mut world).count(), 0);
        Ok(())
    }

    #[test]
    fn test_fetch_outside_include_skips_archetype() -> Result<()> {
        let mut world = world();
        let a = world.create_entity();
        world.add_component(a, Position(1.0))?;
        let b = world.create_entity();
        world.add_component(b, Position(2.0))?;
        world.add_component(b, Health(1))?;

        let query = world.create_query().with::<Position>().build()?;
        let with_health: Vec<Entity> = query
            .iter::<(&Position, &Health)>(&world)
            .map(|(e, _)| e)
            .collect();
        assert_eq!(with_health, vec![b]);
        // Matching ignores the fetch; iterating the included types sees both
        assert_eq!(query.count(&world), 2);
        assert_eq!(query.iter::<&Position>(&world).count(), query.count(&world));
        Ok(())
    }

    #[test]
    fn test_for_each_visits_in_archetype_order() -> Result<()> {
        let mut world = world();
        let plain = world.create_entity();
        world.add_component(plain, Position(1.0))?;
        let fast = world.create_entity();
        world.add_component(fast, Position(2.0))?;
        world.add_component(fast, Velocity(1.0))?;
        let other = world.create_entity();
        world.add_component(other, Position(3.0))?;

        let query = world.create_query().with::<Position>().build()?;
        let mut order = Vec::new();
        query.for_each::<&Position, _>(&world, |entity, _| order.push(entity));
        assert_eq!(order, vec![plain, other, fast]);
        assert_eq!(query.requested_types().len(), 1);
        Ok(())
    }
}
