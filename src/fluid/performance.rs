use std::collections::VecDeque;
use std::time::Duration;

use super::config::SharedConfig;
use super::registry::FluidRegistry;

/// Samples kept in the rolling tick-time window
const SAMPLE_WINDOW: usize = 20;
/// Average tick time above which quality is reduced
const HIGH_LOAD_THRESHOLD: Duration = Duration::from_millis(50);
/// Average tick time below which quality is restored
const LOW_LOAD_THRESHOLD: Duration = Duration::from_millis(10);
/// Ticks between load-shedding sweeps
const SHED_INTERVAL_TICKS: u64 = 100;
/// Active cells per partition above which a sweep sheds
const PARTITION_ACTIVE_LIMIT: usize = 100;
/// Step size for active-range adjustments
const ACTIVE_RANGE_STEP: u32 = 16;

/// Adjusts simulation quality to hold tick times inside a target band.
///
/// Keeps a rolling window of tick durations. A high average trades quality
/// for speed (coarser precision, less frequent ticks, smaller active range);
/// a low average trades back. Every [`SHED_INTERVAL_TICKS`] it additionally
/// sheds half the active cells from any partition that has grown past
/// [`PARTITION_ACTIVE_LIMIT`].
pub struct PerformanceController {
    config: SharedConfig,
    samples: VecDeque<Duration>,
    ticks_observed: u64,
}

impl PerformanceController {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            samples: VecDeque::with_capacity(SAMPLE_WINDOW),
            ticks_observed: 0,
        }
    }

    /// Record one completed tick and react to the rolling average
    pub fn record_tick(&mut self, elapsed: Duration, registry: &FluidRegistry) {
        self.ticks_observed += 1;

        self.samples.push_back(elapsed);
        while self.samples.len() > SAMPLE_WINDOW {
            self.samples.pop_front();
        }

        let average = self.average_tick_time();
        if average > HIGH_LOAD_THRESHOLD {
            self.reduce_quality(average);
        } else if average < LOW_LOAD_THRESHOLD {
            self.restore_quality();
        }

        if self.ticks_observed % SHED_INTERVAL_TICKS == 0 {
            self.shed_load(registry);
        }
    }

    /// Mean of the sampled tick durations; zero before the first sample
    pub fn average_tick_time(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }

    fn reduce_quality(&mut self, average: Duration) {
        let mut config = self.config.write();
        let before = config.clone();

        config.update_frequency = (config.update_frequency + 1).min(5);
        config.precision = config.precision.saturating_sub(1).max(1);
        config.active_range = config.active_range.saturating_sub(ACTIVE_RANGE_STEP).max(32);

        if *config != before {
            log::info!(
                "fluid tick average {:?} over budget, reducing quality: frequency {}, precision {}, range {}",
                average,
                config.update_frequency,
                config.precision,
                config.active_range
            );
        }
    }

    fn restore_quality(&mut self) {
        let mut config = self.config.write();
        let before = config.clone();

        config.update_frequency = config.update_frequency.saturating_sub(1).max(1);
        config.precision = (config.precision + 1).min(4);
        config.active_range = (config.active_range + ACTIVE_RANGE_STEP).min(128);

        if *config != before {
            log::info!(
                "fluid load low, restoring quality: frequency {}, precision {}, range {}",
                config.update_frequency,
                config.precision,
                config.active_range
            );
        }
    }

    /// Deactivate half the cells in every oversized partition. Shed cells
    /// keep their fluid; they are simply no longer visited until a neighbor
    /// transfer re-activates them.
    fn shed_load(&mut self, registry: &FluidRegistry) {
        let mut shed_total = 0usize;

        for (chunk, cells) in registry.active_by_chunk() {
            if cells.len() <= PARTITION_ACTIVE_LIMIT {
                continue;
            }
            let to_shed = cells.len() / 2;
            for pos in cells.into_iter().take(to_shed) {
                registry.mark_inactive(pos);
            }
            shed_total += to_shed;
            log::warn!(
                "partition {:?} over {} active cells, shed {}",
                chunk,
                PARTITION_ACTIVE_LIMIT,
                to_shed
            );
        }

        if shed_total > 0 {
            log::warn!("load shedding deactivated {} fluid cells", shed_total);
        }
    }
}
