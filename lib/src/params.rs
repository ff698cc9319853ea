//! Named, ordered parameter storage.
//!
//! Gradients are produced as a sequence aligned positionally with
//! [`ParameterStore::get_all`], so insertion order is part of the contract.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
  error::{Error, Result},
  tensor::Tensor,
};

pub const SMALL_GAUSSIAN_STD: f32 = 0.1;

/// Position of a parameter in its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub usize);

#[derive(Debug, Clone)]
pub enum Init {
  /// Zero-mean normal with the given standard deviation.
  Gaussian { std: f32 },
  /// Explicit values in row-major order.
  Values(Vec<f32>),
  /// Same constant everywhere.
  Fill(f32),
}

impl Init {
  pub fn small_gaussian() -> Self {
    Init::Gaussian {
      std: SMALL_GAUSSIAN_STD,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
  pub name: String,
  pub value: Tensor,
}

/// What gets written out after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
  pub name: String,
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
  params: Vec<Parameter>,
}

impl ParameterStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn initialize<R: Rng + ?Sized>(
    &mut self,
    name: &str,
    shape: &[usize],
    init: Init,
    rng: &mut R,
  ) -> Result<ParamId> {
    if shape.is_empty() || shape.contains(&0) {
      return Err(Error::shape(format!(
        "parameter {} needs positive rank and extents, got {:?}",
        name, shape
      )));
    }
    let len: usize = shape.iter().product();
    let data = match init {
      Init::Gaussian { std } => {
        let normal = Normal::new(0.0f32, std)
          .map_err(|e| Error::shape(format!("bad std {} for {}: {}", std, name, e)))?;
        normal.sample_iter(rng).take(len).collect()
      }
      Init::Values(values) => values,
      Init::Fill(value) => vec![value; len],
    };
    let value = Tensor::new(shape.to_vec(), data)?;
    self.params.push(Parameter {
      name: name.to_string(),
      value,
    });
    Ok(ParamId(self.params.len() - 1))
  }

  pub fn get_all(&self) -> &[Parameter] {
    &self.params
  }

  pub fn get(&self, id: ParamId) -> Result<&Parameter> {
    self
      .params
      .get(id.0)
      .ok_or_else(|| Error::shape(format!("no parameter with id {}", id.0)))
  }

  pub fn value(&self, id: ParamId) -> Result<&Tensor> {
    self.get(id).map(|p| &p.value)
  }

  pub(crate) fn params_mut(&mut self) -> &mut [Parameter] {
    &mut self.params
  }

  pub fn len(&self) -> usize {
    self.params.len()
  }

  pub fn is_empty(&self) -> bool {
    self.params.is_empty()
  }

  /// Total number of scalar components across all parameters.
  pub fn scalar_count(&self) -> usize {
    self.params.iter().map(|p| p.value.len()).sum()
  }

  /// One line per parameter: its name, numeric type and shape.
  pub fn summary(&self) -> Vec<String> {
    self
      .params
      .iter()
      .map(|p| format!("{}: {}", p.name, p.value))
      .collect()
  }

  /// Overwrites every parameter with saved values. Names, order and shapes must all
  /// match the store; nothing is written unless they do.
  pub fn restore(&mut self, snapshot: &[ParameterSnapshot]) -> Result<()> {
    if snapshot.len() != self.params.len() {
      return Err(Error::shape(format!(
        "snapshot has {} parameters, store has {}",
        snapshot.len(),
        self.params.len()
      )));
    }
    let mut values = Vec::with_capacity(snapshot.len());
    for (p, saved) in self.params.iter().zip(snapshot) {
      if p.name != saved.name || p.value.shape() != saved.shape.as_slice() {
        return Err(Error::shape(format!(
          "saved {} {:?} does not fit {}: {}",
          saved.name, saved.shape, p.name, p.value
        )));
      }
      values.push(Tensor::new(saved.shape.clone(), saved.data.clone())?);
    }
    for (p, value) in self.params.iter_mut().zip(values) {
      p.value = value;
    }
    Ok(())
  }

  pub fn snapshot(&self) -> Vec<ParameterSnapshot> {
    self
      .params
      .iter()
      .map(|p| ParameterSnapshot {
        name: p.name.clone(),
        shape: p.value.shape().to_vec(),
        data: p.value.data().to_vec(),
      })
      .collect()
  }
}
