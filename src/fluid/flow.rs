//! Pure flow calculations between two cells.
//!
//! Every function is stateless and takes the simulation parameters
//! explicitly. Amounts are whole fluid levels; fractional results are
//! truncated.

use super::cell::FluidCell;
use super::config::SimulationConfig;
use super::MAX_FLUID_LEVEL;

/// Whether the target can receive fluid from the source: it must not be
/// full, and must be empty or hold the same substance.
fn target_accepts(source: &FluidCell, target: &FluidCell) -> bool {
    if target.is_full() {
        return false;
    }
    target.is_empty() || target.substance() == source.substance()
}

/// Scale a base amount by flow rate and precision, truncating
fn adjust(base: u32, config: &SimulationConfig) -> u32 {
    (base as f32 * config.flow_rate * (config.precision as f32 / 2.0)) as u32
}

/// Amount of fluid that flows downward due to gravity.
///
/// Gravity is unconditional and may drain the source completely; only the
/// target's remaining capacity caps it.
pub fn gravity_flow(source: &FluidCell, target: &FluidCell, config: &SimulationConfig) -> u8 {
    if source.is_empty() || !target_accepts(source, target) {
        return 0;
    }

    let base = ((source.level() / 2) as u32).max(1);
    let adjusted = adjust(base, config);
    let cap = (MAX_FLUID_LEVEL - target.level()) as u32;

    adjusted.min(cap) as u8
}

/// Amount of fluid that flows sideways due to a pressure difference.
///
/// The source keeps at least one level behind, which prevents oscillatory
/// draining between neighbors.
pub fn pressure_flow(
    source: &FluidCell,
    target: &FluidCell,
    has_momentum_toward_target: bool,
    config: &SimulationConfig,
) -> u8 {
    if source.is_empty() || source.level() <= 1 || !target_accepts(source, target) {
        return 0;
    }

    let diff = source.level() as i32 - target.level() as i32;
    if diff <= 0 {
        return 0;
    }

    let mut base = ((diff / 2) as u32).max(1);
    if has_momentum_toward_target && config.enable_momentum {
        base += 1;
    }
    let adjusted = adjust(base, config);
    let cap = ((MAX_FLUID_LEVEL - target.level()) as u32).min((source.level() - 1) as u32);

    adjusted.min(cap) as u8
}

/// Small continuation flow in the cell's momentum direction.
///
/// Same one-level source floor as pressure flow.
pub fn momentum_flow(source: &FluidCell, target: &FluidCell, config: &SimulationConfig) -> u8 {
    if !config.enable_momentum {
        return 0;
    }
    if source.is_empty() || source.level() <= 1 || !target_accepts(source, target) {
        return 0;
    }

    let adjusted = (1.0 * config.flow_rate) as u32;
    let cap = ((MAX_FLUID_LEVEL - target.level()) as u32).min((source.level() - 1) as u32);

    adjusted.min(cap) as u8
}

/// Linear pressure of a fluid column at the given level
pub fn pressure_at(level: u8) -> f32 {
    level as f32 / MAX_FLUID_LEVEL as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::cell::SubstanceId;

    fn cell(level: i32) -> FluidCell {
        FluidCell::new(SubstanceId::water(), level, false)
    }

    #[test]
    fn gravity_splits_full_cell_in_half() {
        // base = max(1, 8/2) = 4, adjusted = trunc(4 * 1.0 * 1.0) = 4, cap = 8
        let config = SimulationConfig::balanced();
        assert_eq!(gravity_flow(&cell(8), &FluidCell::empty(), &config), 4);
    }

    #[test]
    fn gravity_respects_target_capacity() {
        let config = SimulationConfig::balanced();
        assert_eq!(gravity_flow(&cell(8), &cell(6), &config), 2);
        assert_eq!(gravity_flow(&cell(8), &cell(8), &config), 0);
        assert_eq!(gravity_flow(&FluidCell::empty(), &cell(2), &config), 0);
    }

    #[test]
    fn gravity_can_drain_a_single_level() {
        let config = SimulationConfig::balanced();
        // base = max(1, 0) = 1; no one-level floor on the gravity path
        assert_eq!(gravity_flow(&cell(1), &FluidCell::empty(), &config), 1);
    }

    #[test]
    fn substance_mismatch_yields_zero_flow() {
        let config = SimulationConfig::balanced();
        let lava = FluidCell::new(SubstanceId::lava(), 2, false);
        assert_eq!(gravity_flow(&cell(8), &lava, &config), 0);
        assert_eq!(pressure_flow(&cell(8), &lava, false, &config), 0);
        assert_eq!(momentum_flow(&cell(8), &lava, &config), 0);
    }

    #[test]
    fn pressure_needs_a_positive_difference() {
        let config = SimulationConfig::balanced();
        assert_eq!(pressure_flow(&cell(4), &cell(4), false, &config), 0);
        assert_eq!(pressure_flow(&cell(3), &cell(6), false, &config), 0);
        assert_eq!(pressure_flow(&cell(1), &FluidCell::empty(), false, &config), 0);
    }

    #[test]
    fn pressure_never_drains_below_one() {
        let config = SimulationConfig::balanced();
        let flow = pressure_flow(&cell(2), &FluidCell::empty(), false, &config);
        assert!(flow <= 1, "flow {} would drop source below 1", flow);
        assert_eq!(momentum_flow(&cell(2), &FluidCell::empty(), &config), 1);
    }

    #[test]
    fn momentum_bonus_applies_when_enabled() {
        let config = SimulationConfig::balanced();
        // diff = 6, base = 3, bonus -> 4, adjusted = 4, cap = min(8, 6) = 6
        assert_eq!(pressure_flow(&cell(7), &cell(1), true, &config), 4);
        assert_eq!(pressure_flow(&cell(7), &cell(1), false, &config), 3);

        let no_momentum = SimulationConfig {
            enable_momentum: false,
            ..SimulationConfig::balanced()
        };
        assert_eq!(pressure_flow(&cell(7), &cell(1), true, &no_momentum), 3);
        assert_eq!(momentum_flow(&cell(7), &cell(1), &no_momentum), 0);
    }

    #[test]
    fn precision_scales_flow() {
        let low = SimulationConfig {
            precision: 1,
            ..SimulationConfig::balanced()
        };
        // base = 4, adjusted = trunc(4 * 1.0 * 0.5) = 2
        assert_eq!(gravity_flow(&cell(8), &FluidCell::empty(), &low), 2);

        let high = SimulationConfig {
            precision: 4,
            ..SimulationConfig::balanced()
        };
        // adjusted = trunc(4 * 1.0 * 2.0) = 8
        assert_eq!(gravity_flow(&cell(8), &FluidCell::empty(), &high), 8);
    }

    #[test]
    fn pressure_helper_is_linear() {
        assert_eq!(pressure_at(0), 0.0);
        assert_eq!(pressure_at(4), 0.5);
        assert_eq!(pressure_at(8), 1.0);
    }
}
