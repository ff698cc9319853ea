use crate::{
  error::{Error, Result},
  tensor::Tensor,
};

/// Fraction of predictions that, clamped to [0, 1] and rounded, equal their label.
pub fn accuracy(predictions: &Tensor, labels: &Tensor) -> Result<f32> {
  if predictions.shape() != labels.shape() || labels.is_empty() {
    return Err(Error::shape(format!(
      "accuracy needs equal non-empty shapes, got {:?} and {:?}",
      predictions.shape(),
      labels.shape()
    )));
  }
  let correct = predictions
    .data()
    .iter()
    .zip(labels.data())
    .filter(|(p, l)| p.clamp(0.0, 1.0).round() == **l)
    .count();
  Ok(correct as f32 / labels.len() as f32)
}

/// Bias-corrected exponential moving average.
pub struct ExponentialAverage {
  beta: f32,
  moment: f32,
  pub value: f32,
  t: i32,
}

impl ExponentialAverage {
  pub fn new(initial: f32) -> Self {
    ExponentialAverage {
      beta: 0.99,
      moment: 0.,
      value: initial,
      t: 0,
    }
  }

  pub fn update(&mut self, value: f32) {
    self.t += 1;
    self.moment = self.beta * self.moment + (1. - self.beta) * value;
    // bias correction
    self.value = self.moment / (1. - f32::powi(self.beta, self.t));
  }
}
