//! Labelled in-memory datasets and the batch sampler.
//!
//! Labels are derived from position: within each collection the first half of the rows is
//! class 0 and the second half class 1.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
  error::{Error, Result},
  tensor::Tensor,
};

/// One training step's worth of examples: `[batch, width]` inputs and `[batch]` targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
  pub inputs: Tensor,
  pub targets: Tensor,
}

#[derive(Debug, Clone)]
pub struct Dataset {
  train: Tensor,
  test: Tensor,
  test_labels: Tensor,
}

/// On-disk layout of a single named tensor.
#[derive(Debug, Serialize, Deserialize)]
pub struct NamedTensor {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

/// On-disk layout of a dataset file.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetFile {
  pub train: Option<NamedTensor>,
  pub test: Option<NamedTensor>,
}

/// 0.0 for the first half of a collection of `len` rows, 1.0 for the second.
pub fn label_for(index: usize, len: usize) -> f32 {
  if index < len / 2 {
    0.0
  } else {
    1.0
  }
}

fn check_collection(name: &str, tensor: &Tensor) -> std::result::Result<(usize, usize), String> {
  let (rows, width) = match tensor.shape() {
    &[rows, width] => (rows, width),
    shape => return Err(format!("{} must be [rows, width], got {:?}", name, shape)),
  };
  if rows == 0 || width == 0 {
    return Err(format!("{} is empty: {:?}", name, tensor.shape()));
  }
  if rows % 2 != 0 {
    return Err(format!("{} has {} rows, classes cannot split evenly", name, rows));
  }
  Ok((rows, width))
}

impl Dataset {
  /// `path` is only used for error reporting.
  pub fn new(train: Tensor, test: Tensor, path: &Path) -> Result<Self> {
    let (_, train_width) =
      check_collection("train", &train).map_err(|e| Error::data_load(path, e))?;
    let (_, test_width) =
      check_collection("test", &test).map_err(|e| Error::data_load(path, e))?;
    if train_width != test_width {
      return Err(Error::data_load(
        path,
        format!("train width {} differs from test width {}", train_width, test_width),
      ));
    }
    let rows = test.shape()[0];
    let test_labels = Tensor::new(vec![rows], (0..rows).map(|i| label_for(i, rows)).collect())?;
    Ok(Dataset {
      train,
      test,
      test_labels,
    })
  }

  /// Balanced toy task: class 0 rows are all zeros, class 1 rows all ones.
  pub fn synthetic(train_rows: usize, test_rows: usize, width: usize) -> Result<Self> {
    let collection = |rows: usize| {
      let data = (0..rows)
        .flat_map(|i| std::iter::repeat(label_for(i, rows)).take(width))
        .collect();
      Tensor::new(vec![rows, width], data)
    };
    Dataset::new(collection(train_rows)?, collection(test_rows)?, Path::new("<synthetic>"))
  }

  #[instrument(level = "debug")]
  pub fn load(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).map_err(|e| Error::data_load(path, e.to_string()))?;
    let file: DatasetFile =
      serde_json::from_str(&content).map_err(|e| Error::data_load(path, e.to_string()))?;
    let to_tensor = |name: &str, t: Option<NamedTensor>| -> Result<Tensor> {
      let t = t.ok_or_else(|| Error::data_load(path, format!("missing tensor {:?}", name)))?;
      Tensor::new(t.shape, t.data).map_err(|e| Error::data_load(path, format!("{}: {}", name, e)))
    };
    let dataset = Dataset::new(
      to_tensor("train", file.train)?,
      to_tensor("test", file.test)?,
      path,
    )?;
    info!(
      "Loaded {} training and {} test samples of width {}",
      dataset.train_len(),
      dataset.test_len(),
      dataset.sample_width()
    );
    Ok(dataset)
  }

  pub fn train_len(&self) -> usize {
    self.train.shape()[0]
  }

  pub fn test_len(&self) -> usize {
    self.test.shape()[0]
  }

  pub fn sample_width(&self) -> usize {
    self.train.shape()[1]
  }

  /// `batch_size` rows drawn uniformly with replacement from the training collection.
  pub fn sample_batch<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
    if batch_size == 0 {
      return Err(Error::shape("batch size must be positive"));
    }
    let len = self.train_len();
    let indices: Vec<usize> = (0..batch_size).map(|_| rng.gen_range(0..len)).collect();
    let targets = indices.iter().map(|&i| label_for(i, len)).collect();
    Ok(Batch {
      inputs: self.train.select_rows(&indices)?,
      targets: Tensor::new(vec![batch_size], targets)?,
    })
  }

  /// The whole held-out collection with its labels, in order.
  pub fn full_eval_set(&self) -> (&Tensor, &Tensor) {
    (&self.test, &self.test_labels)
  }
}
