use std::sync::Arc;

use crossbeam_channel::Sender;
use dashmap::DashMap;

use super::cell::FluidCell;
use super::config::{SharedConfig, SimulationConfig};
use super::flow;
use super::registry::FluidRegistry;
use super::MAX_FLUID_LEVEL;
use crate::core::{ChunkPos, FlowDirection, VoxelPos};
use crate::world::WorldView;

/// Per-tick cell arena.
///
/// Populated lazily on first read (registry storage first, then the world
/// adapter), mutated in place by flow application, flushed to the world and
/// registry at tick end, then dropped. Never persists across ticks.
pub struct TickCache {
    entries: DashMap<VoxelPos, FluidCell>,
}

impl TickCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Read a cell, lazily materializing it from the registry or world
    pub fn get(&self, registry: &FluidRegistry, world: &dyn WorldView, pos: VoxelPos) -> FluidCell {
        self.entries
            .entry(pos)
            .or_insert_with(|| {
                registry
                    .lookup(pos)
                    .unwrap_or_else(|| world.read_cell_state(pos))
            })
            .clone()
    }

    pub fn insert(&self, pos: VoxelPos, cell: FluidCell) {
        self.entries.insert(pos, cell);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every entry back to the world adapter and registry storage
    pub fn flush(&self, registry: &FluidRegistry, world: &dyn WorldView) {
        for entry in self.entries.iter() {
            world.write_cell_state(*entry.key(), entry.value().clone());
            registry.store(*entry.key(), entry.value().clone());
        }
    }
}

impl Default for TickCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Which calculator produced a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlowKind {
    Gravity,
    Pressure,
    Momentum,
}

/// A flow whose target lies outside the executing partition, queued for
/// single-threaded resolution after the parallel phase
#[derive(Debug, Clone)]
pub(crate) struct DeferredFlow {
    pub source: VoxelPos,
    pub target: VoxelPos,
    pub direction: FlowDirection,
    pub kind: FlowKind,
}

/// Everything one cell-processing pass needs, borrowed for the tick
pub(crate) struct TickContext<'a> {
    pub registry: &'a FluidRegistry,
    pub world: &'a dyn WorldView,
    pub cache: &'a TickCache,
    pub config: &'a SimulationConfig,
    /// When set, flows may only be applied inside this partition; anything
    /// crossing the boundary goes to `deferred` instead
    pub restrict: Option<ChunkPos>,
    pub deferred: Option<&'a Sender<DeferredFlow>>,
}

/// Mass-conserving transfer between two cached cells.
///
/// Removes up to `amount` from the source, adds what was removed to the
/// target (adopting the substance if the target was empty), and returns any
/// overflow to the source. Total fluid across the pair is invariant, modulo
/// saturation at the level bounds.
pub(crate) fn apply_flow(ctx: &TickContext, source_pos: VoxelPos, target_pos: VoxelPos, amount: u8) {
    let mut source = ctx.cache.get(ctx.registry, ctx.world, source_pos);
    let mut target = ctx.cache.get(ctx.registry, ctx.world, target_pos);

    let substance = match source.substance() {
        Some(substance) => substance.clone(),
        None => return,
    };

    let removed = source.remove_fluid(amount);
    let overflow = target.add_fluid(removed, &substance);
    if overflow > 0 {
        source.add_fluid(overflow, &substance);
    }

    ctx.cache.insert(source_pos, source);
    ctx.cache.insert(target_pos, target);
}

/// Compute and apply one directional transfer; returns whether fluid moved
pub(crate) fn apply_directional_flow(
    ctx: &TickContext,
    source_pos: VoxelPos,
    target_pos: VoxelPos,
    direction: FlowDirection,
    kind: FlowKind,
) -> bool {
    let source = ctx.cache.get(ctx.registry, ctx.world, source_pos);
    let target = ctx.cache.get(ctx.registry, ctx.world, target_pos);

    let amount = match kind {
        FlowKind::Gravity => flow::gravity_flow(&source, &target, ctx.config),
        FlowKind::Pressure => {
            flow::pressure_flow(&source, &target, source.momentum() == direction, ctx.config)
        }
        FlowKind::Momentum => flow::momentum_flow(&source, &target, ctx.config),
    };
    if amount == 0 {
        return false;
    }

    apply_flow(ctx, source_pos, target_pos, amount);

    // Gravity and pressure transfers redirect the source's momentum;
    // momentum continuation keeps it.
    if kind != FlowKind::Momentum {
        let mut source = ctx.cache.get(ctx.registry, ctx.world, source_pos);
        source.set_momentum(direction);
        ctx.cache.insert(source_pos, source);
    }

    ctx.registry.mark_active(source_pos);
    ctx.registry.mark_active(target_pos);
    true
}

/// Attempt a flow one step in `direction`, deferring it if the target falls
/// outside the executing partition
fn try_flow(ctx: &TickContext, pos: VoxelPos, direction: FlowDirection, kind: FlowKind) -> bool {
    let target_pos = pos.offset(direction);

    if let Some(chunk) = ctx.restrict {
        if !chunk.contains(target_pos) {
            if let Some(deferred) = ctx.deferred {
                let _ = deferred.send(DeferredFlow {
                    source: pos,
                    target: target_pos,
                    direction,
                    kind,
                });
            }
            return false;
        }
    }

    apply_directional_flow(ctx, pos, target_pos, direction, kind)
}

/// Process one active cell: gravity, then pressure in fixed N,E,S,W order,
/// then momentum continuation.
///
/// State machine: a cell leaves the worklist only when it is empty at the
/// start of its pass. A nonempty cell stays active even when every outlet is
/// blocked, so it flows again as soon as a neighbor makes room. Both
/// endpoints of any transfer are (re)activated for the next tick.
pub(crate) fn process_cell(ctx: &TickContext, pos: VoxelPos) {
    let cell = ctx.cache.get(ctx.registry, ctx.world, pos);
    if cell.is_empty() {
        ctx.registry.mark_inactive(pos);
        return;
    }
    let was_source = cell.is_source();
    let substance = cell.substance().cloned();

    if pos.y > ctx.world.min_build_height() {
        try_flow(ctx, pos, FlowDirection::Down, FlowKind::Gravity);
    }

    if ctx.config.enable_pressure {
        let cell = ctx.cache.get(ctx.registry, ctx.world, pos);
        if cell.level() > 1 {
            for direction in FlowDirection::HORIZONTAL {
                try_flow(ctx, pos, direction, FlowKind::Pressure);
            }
        }
    }

    if ctx.config.enable_momentum {
        let cell = ctx.cache.get(ctx.registry, ctx.world, pos);
        if cell.momentum() != FlowDirection::None && cell.level() > 1 {
            try_flow(ctx, pos, cell.momentum(), FlowKind::Momentum);
        }
    }

    // With finite fluids disabled a source cell is an inexhaustible supply:
    // refill it after its outflows have been applied.
    if !ctx.config.enable_finite_fluids && was_source {
        if let Some(substance) = substance {
            let mut cell = ctx.cache.get(ctx.registry, ctx.world, pos);
            let deficit = MAX_FLUID_LEVEL - cell.level();
            if deficit > 0 {
                cell.add_fluid(deficit, &substance);
                ctx.cache.insert(pos, cell);
            }
        }
    }
}

/// Single-threaded reference tick driver.
///
/// Snapshots the active set, processes each coordinate through the flow
/// calculator, and flushes the tick cache back to the world. Activations
/// discovered mid-tick take effect next tick, so per-tick work is bounded by
/// the snapshot size.
pub struct FluidSimulator {
    registry: Arc<FluidRegistry>,
    config: SharedConfig,
}

impl FluidSimulator {
    pub fn new(registry: Arc<FluidRegistry>, config: SharedConfig) -> Self {
        Self { registry, config }
    }

    /// Run one simulation tick; returns the number of cells visited
    pub fn process_tick(&self, world: &dyn WorldView) -> usize {
        let config = self.config.read().clone();
        let snapshot = self.registry.active_coordinates();
        let cache = TickCache::new();

        let ctx = TickContext {
            registry: &self.registry,
            world,
            cache: &cache,
            config: &config,
            restrict: None,
            deferred: None,
        };

        for pos in &snapshot {
            process_cell(&ctx, *pos);
        }

        cache.flush(&self.registry, world);
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::cell::SubstanceId;
    use crate::fluid::config;
    use crate::world::MemoryWorld;

    fn water(level: i32) -> FluidCell {
        FluidCell::new(SubstanceId::water(), level, false)
    }

    fn context<'a>(
        registry: &'a FluidRegistry,
        world: &'a MemoryWorld,
        cache: &'a TickCache,
        config: &'a SimulationConfig,
    ) -> TickContext<'a> {
        TickContext {
            registry,
            world,
            cache,
            config,
            restrict: None,
            deferred: None,
        }
    }

    #[test]
    fn apply_flow_conserves_mass() {
        let registry = FluidRegistry::new();
        let world = MemoryWorld::new(0, 16);
        let cache = TickCache::new();
        let config = SimulationConfig::balanced();
        let ctx = context(&registry, &world, &cache, &config);

        let a = VoxelPos::new(0, 1, 0);
        let b = VoxelPos::new(0, 0, 0);
        cache.insert(a, water(7));
        cache.insert(b, water(5));

        // Requested amount exceeds the target's capacity; overflow returns.
        apply_flow(&ctx, a, b, 6);

        let total = cache.get(&registry, &world, a).level() as u32
            + cache.get(&registry, &world, b).level() as u32;
        assert_eq!(total, 12);
        assert_eq!(cache.get(&registry, &world, b).level(), 8);
        assert_eq!(cache.get(&registry, &world, a).level(), 4);
    }

    #[test]
    fn gravity_example_splits_eight_into_four_four() {
        let registry = Arc::new(FluidRegistry::new());
        let world = MemoryWorld::new(0, 16);
        let config = config::shared(SimulationConfig {
            enable_pressure: false,
            enable_momentum: false,
            ..SimulationConfig::balanced()
        });

        let top = VoxelPos::new(0, 5, 0);
        registry.register(top, water(8));

        let simulator = FluidSimulator::new(Arc::clone(&registry), config);
        simulator.process_tick(&world);

        assert_eq!(world.get(top).level(), 4);
        assert_eq!(world.get(top.below()).level(), 4);
        assert_eq!(world.get(top).momentum(), FlowDirection::Down);
        assert!(registry.is_active(top.below()));
    }

    #[test]
    fn empty_tick_settles_to_empty_active_set() {
        let registry = Arc::new(FluidRegistry::new());
        let world = MemoryWorld::new(0, 16);
        let config = config::shared(SimulationConfig::balanced());

        registry.mark_active(VoxelPos::new(0, 0, 0));
        registry.mark_active(VoxelPos::new(1, 0, 0));

        let simulator = FluidSimulator::new(Arc::clone(&registry), config);
        simulator.process_tick(&world);

        assert_eq!(registry.active_count(), 0);
        assert_eq!(world.cell_count(), 0);
    }

    #[test]
    fn pressure_keeps_one_level_behind() {
        let registry = Arc::new(FluidRegistry::new());
        let world = MemoryWorld::new(0, 16);
        let config = config::shared(SimulationConfig {
            enable_momentum: false,
            ..SimulationConfig::balanced()
        });

        // Floor of a different substance blocks gravity.
        let stone = SubstanceId::new("stone");
        let a = VoxelPos::new(0, 1, 0);
        world.set(a.below(), FluidCell::new(stone.clone(), 8, false));
        for direction in FlowDirection::HORIZONTAL {
            world.set(a.offset(direction).below(), FluidCell::new(stone.clone(), 8, false));
        }
        registry.register(a, water(2));

        let simulator = FluidSimulator::new(Arc::clone(&registry), config);
        for _ in 0..10 {
            simulator.process_tick(&world);
        }

        assert!(world.get(a).level() >= 1, "source drained below one level");
    }

    #[test]
    fn infinite_source_refills_after_outflow() {
        let registry = Arc::new(FluidRegistry::new());
        let world = MemoryWorld::new(0, 16);
        let config = config::shared(SimulationConfig {
            enable_finite_fluids: false,
            enable_pressure: false,
            enable_momentum: false,
            ..SimulationConfig::balanced()
        });

        let top = VoxelPos::new(0, 4, 0);
        registry.register(top, FluidCell::source(SubstanceId::water()));

        let simulator = FluidSimulator::new(Arc::clone(&registry), config);
        simulator.process_tick(&world);

        assert_eq!(world.get(top).level(), 8);
        assert!(world.get(top).is_source());
        assert_eq!(world.get(top.below()).level(), 4);
    }

    #[test]
    fn tick_cache_reads_registry_before_world() {
        let registry = FluidRegistry::new();
        let world = MemoryWorld::new(0, 16);
        let pos = VoxelPos::new(0, 0, 0);

        world.set(pos, water(2));
        registry.register(pos, water(7));

        let cache = TickCache::new();
        assert_eq!(cache.get(&registry, &world, pos).level(), 7);
    }

    #[test]
    fn flush_writes_world_and_storage_without_activating() {
        let registry = FluidRegistry::new();
        let world = MemoryWorld::new(0, 16);
        let pos = VoxelPos::new(3, 3, 3);

        let cache = TickCache::new();
        cache.insert(pos, water(6));
        cache.flush(&registry, &world);

        assert_eq!(world.get(pos).level(), 6);
        assert_eq!(registry.get(pos).level(), 6);
        assert!(!registry.is_active(pos));
    }
}
