//! Configuration builders controlling training runs.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WbpeError};

/// Stop condition for a training run; exactly one is configured per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopCondition {
    /// Stop after recording this many merges (vocabulary-size budget).
    ///
    /// A budget of zero is valid and produces a base-character vocabulary
    /// with an empty merge list.
    MergeBudget(usize),
    /// Stop once the best candidate pair's frequency falls below this floor.
    MinPairFrequency(u64),
}

/// Configuration for word-list BPE training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainerConfig {
    /// Condition terminating the merge loop.
    pub stop: StopCondition,
    /// Enables per-iteration logging through the `log` facade.
    pub show_progress: bool,
}

impl TrainerConfig {
    /// Returns a builder initialised with [`TrainerConfig::default`].
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Validates the invariants required for training.
    pub fn validate(&self) -> Result<()> {
        if let StopCondition::MinPairFrequency(floor) = self.stop {
            if floor == 0 {
                return Err(WbpeError::InvalidConfig(
                    "min pair frequency must be greater than zero".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            stop: StopCondition::MergeBudget(4096),
            show_progress: true,
        }
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Default, Clone)]
pub struct TrainerBuilder {
    cfg: TrainerConfig,
}

impl TrainerBuilder {
    /// Creates a builder with [`TrainerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops training after `count` merges have been recorded.
    #[must_use]
    pub fn merge_budget(mut self, count: usize) -> Self {
        self.cfg.stop = StopCondition::MergeBudget(count);
        self
    }

    /// Stops training once the best pair frequency drops below `floor`.
    #[must_use]
    pub fn min_pair_frequency(mut self, floor: u64) -> Self {
        self.cfg.stop = StopCondition::MinPairFrequency(floor);
        self
    }

    /// Enables or disables per-iteration logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`TrainerConfig`].
    pub fn build(self) -> Result<TrainerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}
