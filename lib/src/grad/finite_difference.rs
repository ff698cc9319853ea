use tracing::{instrument, warn};

use super::{GradientEngine, Gradients};
use crate::{
  data::Batch,
  error::Result,
  loss,
  model::Network,
  params::ParameterStore,
  tensor::Tensor,
};

pub const DEFAULT_EPSILON: f32 = 1e-3;

/// Above this many scalars the engine still works but warns: every scalar costs two
/// forward passes and the quotient of close `f32` losses gets noisy.
pub const FINITE_DIFFERENCE_SOFT_LIMIT: usize = 64;

/// Symmetric difference quotient `(L(θ + ε) - L(θ - ε)) / 2ε`, one scalar at a time.
#[derive(Debug, Clone)]
pub struct FiniteDifference {
  pub epsilon: f32,
  warned: bool,
}

impl FiniteDifference {
  pub fn new(epsilon: f32) -> Self {
    FiniteDifference {
      epsilon,
      warned: false,
    }
  }
}

impl Default for FiniteDifference {
  fn default() -> Self {
    FiniteDifference::new(DEFAULT_EPSILON)
  }
}

fn batch_loss(network: &Network, store: &ParameterStore, batch: &Batch) -> Result<f32> {
  let predictions = network.forward(store, &batch.inputs)?;
  loss::mse(&predictions, &batch.targets)
}

impl GradientEngine for FiniteDifference {
  fn name(&self) -> &'static str {
    "finite-difference"
  }

  #[instrument(level = "trace", skip_all)]
  fn compute(
    &mut self,
    network: &Network,
    store: &ParameterStore,
    batch: &Batch,
  ) -> Result<Gradients> {
    let scalars = store.scalar_count();
    if scalars > FINITE_DIFFERENCE_SOFT_LIMIT && !self.warned {
      warn!(
        "finite differences over {} parameters need {} forward passes per step; use autodiff",
        scalars,
        2 * scalars
      );
      self.warned = true;
    }

    let loss = batch_loss(network, store, batch)?;
    let mut scratch = store.clone();
    let mut grads = Vec::with_capacity(store.len());
    for p in 0..store.len() {
      let len = scratch.get_all()[p].value.len();
      let mut grad = vec![0.0f32; len];
      for (i, g) in grad.iter_mut().enumerate() {
        let original = scratch.get_all()[p].value.data()[i];

        scratch.params_mut()[p].value.data_mut()[i] = original + self.epsilon;
        let plus = batch_loss(network, &scratch, batch)?;
        scratch.params_mut()[p].value.data_mut()[i] = original - self.epsilon;
        let minus = batch_loss(network, &scratch, batch)?;
        scratch.params_mut()[p].value.data_mut()[i] = original;

        *g = ((plus as f64 - minus as f64) / (2.0 * self.epsilon as f64)) as f32;
      }
      grads.push(Tensor::new(scratch.get_all()[p].value.shape().to_vec(), grad)?);
    }
    Ok(Gradients { loss, grads })
  }
}
