//! System trait and closure systems

use crate::error::Result;
use crate::World;

/// System trait
///
/// Systems run once per [`World::update`], in registration order, with the
/// tick's delta time. Names are unique within a world.
pub trait System {
    /// Get system name
    fn name(&self) -> &str;

    /// Called once by [`World::add_system`] before the system is stored
    fn init(&mut self, _world: &mut World) -> Result<()> {
        Ok(())
    }

    /// Run system logic against the world
    fn run(&mut self, world: &mut World, delta_time: f32) -> Result<()>;

    /// Called once by [`World::shutdown_systems`]
    fn shutdown(&mut self, _world: &mut World) -> Result<()> {
        Ok(())
    }
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;

/// System backed by a closure
pub struct FnSystem<F> {
    name: String,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut World, f32) -> Result<()>,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut World, f32) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, world: &mut World, delta_time: f32) -> Result<()> {
        (self.func)(world, delta_time)
    }
}

impl<F> std::fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSystem").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        runs: u32,
    }

    impl System for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn run(&mut self, _world: &mut World, _delta_time: f32) -> Result<()> {
            self.runs += 1;
            Ok(())
        }
    }

    #[test]
    fn test_fn_system_receives_delta() -> Result<()> {
        let mut world = World::new();
        let mut seen = 0.0;
        {
            let mut system = FnSystem::new("delta", |_: &mut World, dt: f32| {
                seen = dt;
                Ok(())
            });
            assert_eq!(system.name(), "delta");
            system.run(&mut world, 0.25)?;
        }
        assert_eq!(seen, 0.25);
        Ok(())
    }

    #[test]
    fn test_trait_object_runs() -> Result<()> {
        let mut world = World::new();
        let mut counter = Counter { runs: 0 };
        counter.run(&mut world, 0.016)?;
        counter.run(&mut world, 0.016)?;
        assert_eq!(counter.runs, 2);
        Ok(())
    }

    #[test]
    fn test_lifecycle_hooks_default_to_noop() -> Result<()> {
        let mut world = World::new();
        let mut system: BoxedSystem = Box::new(Counter { runs: 0 });
        system.init(&mut world)?;
        system.shutdown(&mut world)?;
        assert_eq!(world.entity_count(), 0);
        Ok(())
    }
}
