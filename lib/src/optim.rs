use crate::{
  error::{Error, Result},
  grad::Gradients,
  params::ParameterStore,
  tensor::Tensor,
};

/// `θ_i <- θ_i - learning_rate * g_i` for every parameter.
///
/// Every gradient is checked against its parameter before anything is written,
/// so a failed update leaves the store exactly as it was.
pub fn update(store: &mut ParameterStore, gradients: &[Tensor], learning_rate: f32) -> Result<()> {
  if gradients.len() != store.len() {
    return Err(Error::shape(format!(
      "{} gradients for {} parameters",
      gradients.len(),
      store.len()
    )));
  }
  for (p, g) in store.get_all().iter().zip(gradients) {
    if p.value.shape() != g.shape() {
      return Err(Error::shape(format!(
        "gradient for {} has shape {:?}, parameter has {:?}",
        p.name,
        g.shape(),
        p.value.shape()
      )));
    }
  }
  for (p, g) in store.params_mut().iter_mut().zip(gradients) {
    for (v, d) in p.value.data_mut().iter_mut().zip(g.data()) {
      *v -= learning_rate * d;
    }
  }
  Ok(())
}

/// Plain steepest descent with a constant step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
  pub learning_rate: f32,
}

impl Sgd {
  pub fn new(learning_rate: f32) -> Self {
    Sgd { learning_rate }
  }

  pub fn step(&self, store: &mut ParameterStore, gradients: &Gradients) -> Result<()> {
    update(store, &gradients.grads, self.learning_rate)
  }
}
