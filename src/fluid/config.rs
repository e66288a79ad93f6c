use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::FluidError;

/// Simulation parameters consumed by the flow calculator, simulator and
/// registry.
///
/// Owned externally and shared by reference; the adaptive performance
/// controller mutates the shared copy between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation precision (higher = more realistic but more intensive), 1-4
    pub precision: u8,
    /// Flow rate multiplier, 0.1-5.0
    pub flow_rate: f32,
    /// Enable pressure-based horizontal flow
    pub enable_pressure: bool,
    /// Enable momentum-based flow continuation
    pub enable_momentum: bool,
    /// Enable finite fluids (disable for infinite source cells)
    pub enable_finite_fluids: bool,
    /// How often the simulation runs, in ticks
    pub update_frequency: u32,
    /// Maximum distance for active fluid simulation
    pub active_range: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl SimulationConfig {
    /// Balanced realism and performance
    pub fn balanced() -> Self {
        Self {
            precision: 2,
            flow_rate: 1.0,
            enable_pressure: true,
            enable_momentum: true,
            enable_finite_fluids: true,
            update_frequency: 1,
            active_range: 64,
        }
    }

    /// Reduced realism for heavy worlds
    pub fn high_performance() -> Self {
        Self {
            precision: 1,
            flow_rate: 1.5,
            enable_pressure: true,
            enable_momentum: false,
            enable_finite_fluids: true,
            update_frequency: 2,
            active_range: 32,
        }
    }

    /// Maximum realism at higher cost
    pub fn high_realism() -> Self {
        Self {
            precision: 4,
            flow_rate: 0.8,
            enable_pressure: true,
            enable_momentum: true,
            enable_finite_fluids: true,
            update_frequency: 1,
            active_range: 128,
        }
    }

    /// Clamp every parameter into its valid range
    pub fn clamped(mut self) -> Self {
        self.precision = self.precision.clamp(1, 4);
        self.flow_rate = self.flow_rate.clamp(0.1, 5.0);
        self.update_frequency = self.update_frequency.clamp(1, 20);
        self.active_range = self.active_range.clamp(16, 256);
        self
    }

    /// Load a config from a TOML file, clamping out-of-range values
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FluidError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FluidError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SimulationConfig =
            toml::from_str(&text).map_err(|source| FluidError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config.clamped())
    }
}

/// Shared, mutable simulation configuration.
///
/// Explicitly constructed and passed into simulator, processor and
/// controller; there is no process-wide global.
pub type SharedConfig = Arc<RwLock<SimulationConfig>>;

/// Wrap a config for sharing across components
pub fn shared(config: SimulationConfig) -> SharedConfig {
    Arc::new(RwLock::new(config.clamped()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_fixes_out_of_range_values() {
        let config = SimulationConfig {
            precision: 9,
            flow_rate: 50.0,
            update_frequency: 0,
            active_range: 4,
            ..SimulationConfig::balanced()
        }
        .clamped();

        assert_eq!(config.precision, 4);
        assert_eq!(config.flow_rate, 5.0);
        assert_eq!(config.update_frequency, 1);
        assert_eq!(config.active_range, 16);
    }

    #[test]
    fn presets_are_already_valid() {
        for preset in [
            SimulationConfig::balanced(),
            SimulationConfig::high_performance(),
            SimulationConfig::high_realism(),
        ] {
            assert_eq!(preset.clone().clamped(), preset);
        }
    }

    #[test]
    fn toml_round_trip() {
        let config = SimulationConfig::high_realism();
        let text = toml::to_string(&config).expect("serialize");
        let restored: SimulationConfig = toml::from_str(&text).expect("parse");
        assert_eq!(restored, config);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let restored: SimulationConfig =
            toml::from_str("precision = 3\nenable_momentum = false\n").expect("parse");
        assert_eq!(restored.precision, 3);
        assert!(!restored.enable_momentum);
        assert_eq!(restored.flow_rate, SimulationConfig::balanced().flow_rate);
    }
}
