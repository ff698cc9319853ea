use std::path::Path;

use descent::config::TrainConfig;
use serde::Deserialize;

/// Config file format. Every field is optional; whatever is missing falls back to
/// [`TrainConfig::default`].
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
  pub batch_size: Option<usize>,
  pub learning_rate: Option<f32>,
  pub num_updates: Option<usize>,
  pub eval_interval: Option<usize>,
  pub sample_width: Option<usize>,
  pub seed: Option<u64>,
  /// Directory for trained weights and the recorded graph
  pub artifacts: Option<String>,
}

impl AppConfig {
  pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
  }

  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      batch_size: other.batch_size.or(self.batch_size),
      learning_rate: other.learning_rate.or(self.learning_rate),
      num_updates: other.num_updates.or(self.num_updates),
      eval_interval: other.eval_interval.or(self.eval_interval),
      sample_width: other.sample_width.or(self.sample_width),
      seed: other.seed.or(self.seed),
      artifacts: other.artifacts.or(self.artifacts),
    }
  }

  pub fn train_config(&self) -> TrainConfig {
    let d = TrainConfig::default();
    TrainConfig {
      batch_size: self.batch_size.unwrap_or(d.batch_size),
      learning_rate: self.learning_rate.unwrap_or(d.learning_rate),
      num_updates: self.num_updates.unwrap_or(d.num_updates),
      eval_interval: self.eval_interval.unwrap_or(d.eval_interval),
      sample_width: self.sample_width.unwrap_or(d.sample_width),
      seed: self.seed.unwrap_or(d.seed),
    }
  }
}
