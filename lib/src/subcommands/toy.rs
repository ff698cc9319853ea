use tracing::{info, instrument};

use crate::{
  error::Result,
  grad::EngineKind,
  model::{toy_batch, toy_linear, TOY_LEARNING_RATE, TOY_STEPS, TOY_WEIGHTS},
  optim::Sgd,
  params::ParameterStore,
};

/// State before one update of the walkthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct ToyStep {
  pub step: usize,
  pub output: f32,
  pub weights: [f32; 2],
}

#[derive(Debug)]
pub struct Toy {
  engine: EngineKind,
}

impl Toy {
  pub fn new(engine: EngineKind) -> Self {
    Self { engine }
  }

  /// Eleven updates of `y = w1 * x1 + w2 * x2` towards 20.0; returns the pre-update
  /// trace followed by the final state.
  #[instrument(level = "info", skip_all, fields(engine = ?self.engine))]
  pub fn run(self) -> Result<Vec<ToyStep>> {
    let mut store = ParameterStore::new();
    let network = toy_linear(&mut store, TOY_WEIGHTS)?;
    let batch = toy_batch()?;
    let mut engine = self.engine.build();
    let sgd = Sgd::new(TOY_LEARNING_RATE);

    let mut trace = Vec::with_capacity(TOY_STEPS + 1);
    for step in 0..=TOY_STEPS {
      let output = network.forward(&store, &batch.inputs)?.data()[0];
      let w = store.get_all()[0].value.data();
      let weights = [w[0], w[1]];
      info!(
        "step {:>2}: output {:>9.4}, weights [{:.4}, {:.4}]",
        step, output, weights[0], weights[1]
      );
      trace.push(ToyStep { step, output, weights });
      if step < TOY_STEPS {
        let gradients = engine.compute(&network, &store, &batch)?;
        sgd.step(&mut store, &gradients)?;
      }
    }
    Ok(trace)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::TOY_TARGET;

  fn within(a: f32, b: f32, rel: f32) -> bool {
    (a - b).abs() <= rel * b.abs()
  }

  fn check(engine: EngineKind) {
    let trace = Toy::new(engine).run().unwrap();
    assert_eq!(trace.len(), TOY_STEPS + 1);
    assert!((trace[0].output - 0.55).abs() < 1e-5);
    let errors: Vec<f32> = trace.iter().map(|s| (TOY_TARGET - s.output).abs()).collect();
    // the error halves on every update
    for pair in errors.windows(2) {
      assert!(pair[1] < pair[0], "{:?}", errors);
    }
    let last = trace.last().unwrap();
    assert!(errors[TOY_STEPS] < 0.05, "{:?}", errors);
    assert!(within(last.weights[0], 15.74, 0.01), "{:?}", last.weights);
    assert!(within(last.weights[1], 8.47, 0.01), "{:?}", last.weights);
  }

  #[test]
  fn autodiff_walkthrough() {
    check(EngineKind::Autodiff);
  }

  #[test]
  fn finite_difference_walkthrough() {
    check(EngineKind::FiniteDifference);
  }
}
