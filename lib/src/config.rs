use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const BATCH_SIZE: usize = 16;
pub const LEARNING_RATE: f32 = 0.01;
pub const NUM_UPDATES: usize = 5000;
pub const EVAL_INTERVAL: usize = 500;
pub const SAMPLE_WIDTH: usize = 1200;
pub const SEED: u64 = 0;

/// Knobs of one training run. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
  pub batch_size: usize,
  pub learning_rate: f32,
  pub num_updates: usize,
  pub eval_interval: usize,
  pub sample_width: usize,
  pub seed: u64,
}

impl Default for TrainConfig {
  fn default() -> Self {
    TrainConfig {
      batch_size: BATCH_SIZE,
      learning_rate: LEARNING_RATE,
      num_updates: NUM_UPDATES,
      eval_interval: EVAL_INTERVAL,
      sample_width: SAMPLE_WIDTH,
      seed: SEED,
    }
  }
}

impl TrainConfig {
  pub fn validate(&self) -> Result<()> {
    if self.batch_size == 0 {
      return Err(Error::Config("batch_size must be positive".to_string()));
    }
    if self.eval_interval == 0 {
      return Err(Error::Config("eval_interval must be positive".to_string()));
    }
    if self.sample_width == 0 {
      return Err(Error::Config("sample_width must be positive".to_string()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = TrainConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!((config.batch_size, config.sample_width), (16, 1200));
  }

  #[test]
  fn zero_interval_is_rejected() {
    let config = TrainConfig {
      eval_interval: 0,
      ..TrainConfig::default()
    };
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }
}
