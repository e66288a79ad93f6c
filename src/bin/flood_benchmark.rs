//! Flood benchmark: drops a slab of water onto a stone floor and compares
//! the single-threaded and chunk-parallel tick drivers.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use fluid_engine::core::VoxelPos;
use fluid_engine::fluid::{FluidCell, FluidPhysics, SimulationConfig, SubstanceId};
use fluid_engine::world::{MemoryWorld, WorldView};

const FLOOR_SIZE: i32 = 64;
const SLAB_SIZE: i32 = 32;
const TICKS: usize = 100;

fn build_world() -> Arc<MemoryWorld> {
    let world = Arc::new(MemoryWorld::new(0, 64));
    let stone = SubstanceId::new("stone");

    for x in 0..FLOOR_SIZE {
        for z in 0..FLOOR_SIZE {
            world.set(VoxelPos::new(x, 0, z), FluidCell::new(stone.clone(), 8, false));
        }
    }
    world
}

fn seed_slab(engine: &FluidPhysics) {
    let offset = (FLOOR_SIZE - SLAB_SIZE) / 2;
    for x in 0..SLAB_SIZE {
        for z in 0..SLAB_SIZE {
            let pos = VoxelPos::new(offset + x, 8, offset + z);
            engine.register_cell(pos, FluidCell::new(SubstanceId::water(), 8, false));
        }
    }
}

fn run(mut engine: FluidPhysics, world: &Arc<dyn WorldView>, label: &str) -> Result<()> {
    seed_slab(&engine);

    let start = Instant::now();
    let mut cells = 0usize;
    for _ in 0..TICKS {
        if let Some(stats) = engine.tick(world) {
            cells += stats.cells_processed;
        }
    }
    let elapsed = start.elapsed();

    println!("  {} ticks in {:?}", TICKS, elapsed);
    println!("  {:.2} ms/tick average", elapsed.as_secs_f64() * 1000.0 / TICKS as f64);
    println!("  {} cell visits total", cells);
    println!("  {} cells still active [{}]", engine.registry().active_count(), label);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let threads = num_cpus::get();
    let config = SimulationConfig::high_performance();

    println!("=== Flood Benchmark ===");
    println!(
        "{}x{} water slab over a {}x{} floor, {} ticks\n",
        SLAB_SIZE, SLAB_SIZE, FLOOR_SIZE, FLOOR_SIZE, TICKS
    );

    println!("Single-threaded:");
    let world: Arc<dyn WorldView> = build_world();
    run(FluidPhysics::new(config.clone()), &world, "serial")?;

    println!("\nPartitioned ({} threads):", threads);
    let world: Arc<dyn WorldView> = build_world();
    run(FluidPhysics::with_parallel(config, threads)?, &world, "parallel")?;

    Ok(())
}
