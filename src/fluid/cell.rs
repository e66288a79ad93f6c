use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{MAX_FLUID_LEVEL, MIN_FLUID_LEVEL};
use crate::core::FlowDirection;

/// Identifier of the fluid kind occupying a cell.
///
/// Persisted as its plain string name; the host adapter maps this onto
/// whatever native fluid representation it uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstanceId(String);

impl SubstanceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn water() -> Self {
        Self::new("water")
    }

    pub fn lava() -> Self {
        Self::new("lava")
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Fluid state of one grid cell.
///
/// Invariants maintained by every mutator:
/// - `level` stays within `[0, 8]`; out-of-range inputs are clamped, never
///   rejected.
/// - `level == 0` implies no substance and no source flag.
/// - `is_source` implies `level == 8`; it is set when a fill reaches max
///   level and cleared whenever the level drops below max.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidCell {
    substance: Option<SubstanceId>,
    level: u8,
    momentum: FlowDirection,
    is_source: bool,
    last_update: u64,
}

impl Default for FluidCell {
    fn default() -> Self {
        Self::empty()
    }
}

impl FluidCell {
    /// An empty cell: no substance, level 0
    pub fn empty() -> Self {
        Self {
            substance: None,
            level: 0,
            momentum: FlowDirection::None,
            is_source: false,
            last_update: 0,
        }
    }

    /// Create a cell with the given substance and clamped level
    pub fn new(substance: SubstanceId, level: i32, is_source: bool) -> Self {
        let level = level.clamp(MIN_FLUID_LEVEL as i32, MAX_FLUID_LEVEL as i32) as u8;
        if level == 0 {
            return Self::empty();
        }
        Self {
            substance: Some(substance),
            level,
            momentum: FlowDirection::None,
            is_source: is_source && level == MAX_FLUID_LEVEL,
            last_update: now_millis(),
        }
    }

    /// A full source cell of the given substance
    pub fn source(substance: SubstanceId) -> Self {
        Self::new(substance, MAX_FLUID_LEVEL as i32, true)
    }

    pub fn substance(&self) -> Option<&SubstanceId> {
        self.substance.as_ref()
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn momentum(&self) -> FlowDirection {
        self.momentum
    }

    pub fn set_momentum(&mut self, momentum: FlowDirection) {
        self.momentum = momentum;
    }

    pub fn is_source(&self) -> bool {
        self.is_source
    }

    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    pub fn is_empty(&self) -> bool {
        self.level == 0 || self.substance.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.level == MAX_FLUID_LEVEL
    }

    /// Set the level, clamped to the valid range.
    ///
    /// Dropping to 0 clears the substance; dropping below max clears the
    /// source flag.
    pub fn set_level(&mut self, level: i32) {
        self.level = level.clamp(MIN_FLUID_LEVEL as i32, MAX_FLUID_LEVEL as i32) as u8;
        self.last_update = now_millis();

        if self.level == 0 {
            self.substance = None;
            self.is_source = false;
        } else if self.level < MAX_FLUID_LEVEL {
            self.is_source = false;
        }
    }

    /// Mark or unmark this cell as an inexhaustible source.
    ///
    /// Marking pins the level at max; marking an empty cell is a no-op
    /// because a source must hold a substance.
    pub fn set_source(&mut self, is_source: bool) {
        if is_source {
            if self.substance.is_some() {
                self.level = MAX_FLUID_LEVEL;
                self.is_source = true;
                self.last_update = now_millis();
            }
        } else {
            self.is_source = false;
        }
    }

    /// Add fluid up to the maximum level, adopting the substance if empty.
    ///
    /// Returns the amount that could not be added (overflow). A substance
    /// mismatch accepts nothing and returns the full amount.
    pub fn add_fluid(&mut self, amount: u8, substance: &SubstanceId) -> u8 {
        if !self.is_empty() && self.substance.as_ref() != Some(substance) {
            return amount;
        }
        if self.is_empty() {
            self.substance = Some(substance.clone());
        }

        let new_level = self.level as u32 + amount as u32;
        let overflow = new_level.saturating_sub(MAX_FLUID_LEVEL as u32) as u8;
        self.level = new_level.min(MAX_FLUID_LEVEL as u32) as u8;
        self.last_update = now_millis();

        if self.level == MAX_FLUID_LEVEL {
            self.is_source = true;
        }

        overflow
    }

    /// Remove fluid, bounded by the current level.
    ///
    /// Returns the amount actually removed. Fully draining clears the
    /// substance; any reduction below max clears the source flag.
    pub fn remove_fluid(&mut self, amount: u8) -> u8 {
        let removed = self.level.min(amount);
        self.level -= removed;
        self.last_update = now_millis();

        if self.level == 0 {
            self.substance = None;
            self.is_source = false;
        } else if self.level < MAX_FLUID_LEVEL {
            self.is_source = false;
        }

        removed
    }
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
