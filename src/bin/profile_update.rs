use signet_ecs::{Result, World};
use std::{fs::File, time::Instant};

use tracing_subscriber::{self, prelude::*};

#[derive(Debug, Clone)]
struct Position(f32, f32, f32);

#[derive(Debug, Clone)]
struct Velocity(f32, f32, f32);

#[derive(Debug, Clone)]
struct Health(u32);

#[tracing::instrument(skip(world))]
fn populate(world: &mut World, count: usize) -> Result<()> {
    for i in 0..count {
        if i % 1_000 == 0 {
            tracing::info!("Creating entity {}/{}", i, count);
        }
        let entity = world.create_entity();
        world.add_component(entity, Position(0.0, 0.0, 0.0))?;
        world.add_component(entity, Velocity(1.0, 0.0, 0.0))?;
        if i % 20 == 0 {
            world.add_component(entity, Health(100))?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Set up tracing subscriber to write to a file
    let file = File::create("trace.json")
        .map_err(|err| signet_ecs::EcsError::ConfigError(err.to_string()))?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .init();

    let mut world = World::new();
    world.register_component::<Position>();
    world.register_component::<Velocity>();
    world.register_component::<Health>();

    populate(&mut world, 10_000)?;

    let query = world
        .create_query()
        .with::<Position>()
        .with::<Velocity>()
        .without::<Health>()
        .build()?;
    world.add_system_fn("movement", move |world: &mut World, dt: f32| {
        query.for_each_mut::<(&mut Position, &Velocity), _>(world, |_, (pos, vel)| {
            pos.0 += vel.0 * dt;
            pos.1 += vel.1 * dt;
            pos.2 += vel.2 * dt;
        });
        Ok(())
    })?;

    println!("Profiling 100 updates over 10k entities...");
    let start = Instant::now();
    for _ in 0..100 {
        world.update(1.0 / 60.0)?;
    }
    println!("100 updates complete in: {:?}", start.elapsed());
    Ok(())
}
