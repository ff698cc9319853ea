use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, instrument};

use crate::{
  config::TrainConfig,
  data::Dataset,
  error::Result,
  grad::{record_forward, EngineKind},
  model::genre_classifier,
  params::{ParameterSnapshot, ParameterStore},
  train::{TrainReport, Trainer},
};

pub const SYNTHETIC_TRAIN_ROWS: usize = 1000;
pub const SYNTHETIC_TEST_ROWS: usize = 200;

pub const WEIGHTS_FILE: &str = "weights.json";
pub const GRAPH_FILE: &str = "autodiff.graphml";

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
  File(PathBuf),
  /// Zeros vs ones at the configured sample width.
  Synthetic,
}

#[derive(Debug)]
pub struct Train {
  source: DataSource,
  config: TrainConfig,
  engine: EngineKind,
  weights_input: Option<PathBuf>,
  weights_output: Option<PathBuf>,
  artifacts_dir: Option<PathBuf>,
}

impl Train {
  pub fn new(source: DataSource, config: TrainConfig, engine: EngineKind) -> Self {
    Self {
      source,
      config,
      engine,
      weights_input: None,
      weights_output: None,
      artifacts_dir: None,
    }
  }

  /// Start from weights written by an earlier run instead of a fresh initialisation.
  pub fn weights_input(mut self, path: &Path) -> Self {
    self.weights_input = Some(PathBuf::from(path));
    self
  }

  pub fn weights_output(mut self, path: &Path) -> Self {
    self.weights_output = Some(PathBuf::from(path));
    self
  }

  /// Directory that receives the trained weights and the recorded graph.
  pub fn artifacts(mut self, dir: &Path) -> Self {
    self.artifacts_dir = Some(PathBuf::from(dir));
    self
  }

  #[instrument(level = "info", skip_all, fields(engine = ?self.engine))]
  pub fn run(self) -> Result<TrainReport> {
    let mut rng = StdRng::seed_from_u64(self.config.seed);
    let dataset = match &self.source {
      DataSource::File(path) => Dataset::load(path)?,
      DataSource::Synthetic => Dataset::synthetic(
        SYNTHETIC_TRAIN_ROWS,
        SYNTHETIC_TEST_ROWS,
        self.config.sample_width,
      )?,
    };

    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, self.config.sample_width, &mut rng)?;
    info!(
      "Model has {} parameters ({} scalars)",
      store.len(),
      store.scalar_count()
    );
    if let Some(path) = &self.weights_input {
      let saved: Vec<ParameterSnapshot> = crate::utils::deserialize_from_file(path)?;
      store.restore(&saved)?;
      info!("Restored weights from {:?}", path);
    }

    let mut trainer = Trainer::new(self.config.clone(), self.engine.build())?;
    let report = trainer.run(&network, &mut store, &dataset, &mut rng)?;

    if let Some(path) = &self.weights_output {
      crate::utils::serialize_to_file(path, &store.snapshot())?;
      info!("Wrote weights to {:?}", path);
    }
    if let Some(dir) = &self.artifacts_dir {
      std::fs::create_dir_all(dir)?;
      crate::utils::serialize_to_file(&dir.join(WEIGHTS_FILE), &store.snapshot())?;
      let batch = dataset.sample_batch(self.config.batch_size, &mut rng)?;
      let recording = record_forward(&network, &store, &batch)?;
      std::fs::write(dir.join(GRAPH_FILE), recording.tape.to_graphml()?)?;
      info!("Wrote artifacts to {:?}", dir);
    }
    Ok(report)
  }
}
