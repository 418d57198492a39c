use std::cell::RefCell;
use std::rc::Rc;

use signet_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct A(i32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct B(i32);

fn world() -> World {
    let mut world = World::new();
    world.register_component::<A>();
    world.register_component::<B>();
    world
}

#[test]
fn test_deferred_actions_run_after_all_systems_in_order() -> Result<()> {
    let mut world = world();
    let log = Rc::new(RefCell::new(Vec::new()));

    for name in ["first", "second"] {
        let log = Rc::clone(&log);
        world.add_system_fn(name, move |world: &mut World, _dt: f32| {
            log.borrow_mut().push(format!("run {name}"));
            let log = Rc::clone(&log);
            world.defer(move |_| {
                log.borrow_mut().push(format!("deferred {name}"));
                Ok(())
            });
            Ok(())
        })?;
    }

    world.update(0.016)?;
    assert_eq!(
        *log.borrow(),
        vec!["run first", "run second", "deferred first", "deferred second"]
    );
    assert_eq!(world.pending_commands(), 0);
    Ok(())
}

#[test]
fn test_system_spawns_through_queue() -> Result<()> {
    let mut world = world();
    let query = world.create_query().with::<A>().build()?;

    world.add_system_fn("spawner", |world: &mut World, _dt: f32| {
        let mut commands = CommandBuffer::new();
        commands.spawn(|world, entity| {
            world.add_component(entity, A(1))?;
            world.add_component(entity, B(2))
        });
        world.defer_commands(commands);
        Ok(())
    })?;

    world.update(0.016)?;
    world.update(0.016)?;
    assert_eq!(world.entity_count(), 2);

    let mut query = query;
    query.refresh(&world);
    let items: Vec<(A, B)> = query
        .iter::<(&A, &B)>(&world)
        .map(|(_, (a, b))| (*a, *b))
        .collect();
    assert_eq!(items, vec![(A(1), B(2)), (A(1), B(2))]);
    Ok(())
}

#[test]
fn test_mutation_during_iteration_is_deferred() -> Result<()> {
    let mut world = world();
    for i in 0..6 {
        let e = world.create_entity();
        world.add_component(e, A(i))?;
    }

    let query = world.create_query().with::<A>().without::<B>().build()?;
    world.add_system_fn("tagger", move |world: &mut World, _dt: f32| {
        let mut commands = CommandBuffer::new();
        query.for_each::<&A, _>(world, |entity, a| {
            if a.0 % 2 == 0 {
                commands.add_component(entity, B(a.0));
            }
        });
        world.defer_commands(commands);
        Ok(())
    })?;

    world.update(0.016)?;
    let tagged = world.create_query().with::<B>().build()?;
    assert_eq!(tagged.count(&world), 3);
    Ok(())
}

#[test]
fn test_failing_system_discards_queue() -> Result<()> {
    let mut world = world();
    let e = world.create_entity();
    let ran_after = Rc::new(RefCell::new(false));

    world.add_system_fn("queue_then_fail", move |world: &mut World, _dt: f32| {
        world.defer(move |world| world.add_component(e, A(1)));
        Err(EcsError::SystemError {
            system: "queue_then_fail".to_string(),
            message: "out of budget".to_string(),
        })
    })?;
    let flag = Rc::clone(&ran_after);
    world.add_system_fn("later", move |_: &mut World, _dt: f32| {
        *flag.borrow_mut() = true;
        Ok(())
    })?;

    let err = world.update(0.016).unwrap_err();
    assert_eq!(err.to_string(), "System queue_then_fail failed: out of budget");
    assert!(!*ran_after.borrow());
    assert_eq!(world.pending_commands(), 0);
    assert!(!world.has_component::<A>(e));
    Ok(())
}

#[test]
fn test_failing_deferred_action_surfaces_from_update() {
    let mut world = world();
    let e = world.create_entity();
    world.destroy_entity(e).unwrap();

    world.defer(move |world| world.add_component(e, A(1)));
    assert_eq!(world.update(0.016), Err(EcsError::InvalidEntity(e)));
}

#[test]
fn test_actions_deferred_by_deferred_actions_land_in_same_tick() -> Result<()> {
    let mut world = world();
    let e = world.create_entity();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&seen);
    world.add_system_fn("observe_then_queue", move |world: &mut World, _dt: f32| {
        log.borrow_mut()
            .push((world.has_component::<A>(e), world.has_component::<B>(e)));
        if !world.has_component::<A>(e) {
            world.defer(move |world| {
                world.defer(move |world| world.add_component(e, B(2)));
                world.add_component(e, A(1))
            });
        }
        Ok(())
    })?;

    world.update(0.016)?;
    assert!(world.has_component::<A>(e));
    assert!(world.has_component::<B>(e));
    assert_eq!(world.pending_commands(), 0);

    // The next tick's systems see both changes
    world.update(0.016)?;
    assert_eq!(*seen.borrow(), vec![(false, false), (true, true)]);
    Ok(())
}
