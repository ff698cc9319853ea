//! The fixed-budget training loop.
//!
//! `Initializing -> Training -> (every eval_interval steps) Evaluating -> Training -> ... -> Done`.
//! A run ends after exactly `num_updates` updates; there is no convergence test.

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::{
  config::TrainConfig,
  data::Dataset,
  error::{Error, Result},
  grad::GradientEngine,
  metrics::{accuracy, ExponentialAverage},
  model::Network,
  optim::Sgd,
  params::ParameterStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Initializing,
  Training,
  Evaluating,
  Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
  pub step: usize,
  /// Fraction in [0, 1].
  pub accuracy: f32,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
  pub evaluations: Vec<Evaluation>,
  pub final_loss: f32,
  /// `"{name}: f32 [{shape}]"`, one per parameter.
  pub parameters: Vec<String>,
}

/// Runs a fixed number of SGD updates and evaluates on the held-out set every
/// `eval_interval` of them.
///
/// Saturation of the output activation is checked on the held-out predictions at each
/// evaluation, not on training batches, and is reported once per run.
pub struct Trainer {
  config: TrainConfig,
  engine: Box<dyn GradientEngine>,
  phase: Phase,
  /// Update at which saturation was first reported.
  saturation_reported_at: Option<usize>,
}

impl Trainer {
  pub fn new(config: TrainConfig, engine: Box<dyn GradientEngine>) -> Result<Self> {
    config.validate()?;
    Ok(Trainer {
      config,
      engine,
      phase: Phase::Initializing,
      saturation_reported_at: None,
    })
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  fn enter(&mut self, phase: Phase) {
    debug!(from = ?self.phase, to = ?phase, "phase change");
    self.phase = phase;
  }

  #[instrument(level = "info", name = "train", skip_all, fields(engine = self.engine.name()))]
  pub fn run<R: Rng + ?Sized>(
    &mut self,
    network: &Network,
    store: &mut ParameterStore,
    dataset: &Dataset,
    rng: &mut R,
  ) -> Result<TrainReport> {
    self.enter(Phase::Initializing);
    if dataset.sample_width() != network.input_width() {
      return Err(Error::shape(format!(
        "dataset samples have width {}, network expects {}",
        dataset.sample_width(),
        network.input_width()
      )));
    }
    let total = self.config.num_updates;
    let sgd = Sgd::new(self.config.learning_rate);
    let mut loss_avg = ExponentialAverage::new(1.0);
    let mut final_loss = f32::NAN;
    let mut evaluations = Vec::with_capacity(total / self.config.eval_interval);
    let start = std::time::Instant::now();

    self.enter(Phase::Training);
    for step in 1..=total {
      let batch = dataset.sample_batch(self.config.batch_size, rng)?;
      let gradients = self.engine.compute(network, store, &batch)?;
      if !gradients.loss.is_finite() {
        self.enter(Phase::Done);
        return Err(Error::NumericInstability(format!(
          "loss became {} at update {}",
          gradients.loss, step
        )));
      }
      if let Some(i) = gradients.grads.iter().position(|g| !g.is_finite()) {
        self.enter(Phase::Done);
        return Err(Error::NumericInstability(format!(
          "gradient of {} is not finite at update {}",
          store.get_all()[i].name,
          step
        )));
      }
      sgd.step(store, &gradients)?;
      loss_avg.update(gradients.loss);
      final_loss = gradients.loss;

      if step % self.config.eval_interval == 0 {
        self.enter(Phase::Evaluating);
        let evaluation = self.evaluate(network, store, dataset, step)?;
        info!(
          "Accuracy after update {}/{}: {:.2}%",
          step,
          total,
          evaluation.accuracy * 100.0
        );
        debug!(loss = loss_avg.value, "smoothed training loss");
        evaluations.push(evaluation);
        self.enter(Phase::Training);
      }
    }
    self.enter(Phase::Done);

    if total > 0 {
      debug!(
        "Took {:.2}s, {}µs / update",
        start.elapsed().as_secs_f32(),
        start.elapsed().as_micros() / total as u128
      );
    }
    let parameters = store.summary();
    for line in &parameters {
      info!("{}", line);
    }
    Ok(TrainReport {
      evaluations,
      final_loss,
      parameters,
    })
  }

  /// Forward pass over the whole held-out set. Takes the store by shared reference:
  /// evaluation cannot move a parameter.
  fn evaluate(
    &mut self,
    network: &Network,
    store: &ParameterStore,
    dataset: &Dataset,
    step: usize,
  ) -> Result<Evaluation> {
    let (inputs, labels) = dataset.full_eval_set();
    let predictions = network.forward(store, inputs)?;
    let saturated = network.saturated(&predictions);
    if saturated > 0 && self.saturation_reported_at.is_none() {
      warn!(
        "{} of {} held-out predictions saturated the {} output at update {}",
        saturated,
        predictions.len(),
        network.output_activation(),
        step
      );
      self.saturation_reported_at = Some(step);
    }
    Ok(Evaluation {
      step,
      accuracy: accuracy(&predictions, labels)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use rand::{rngs::StdRng, SeedableRng};

  use super::*;
  use crate::{
    data::Batch,
    grad::{Autodiff, EngineKind, Gradients},
    model::{genre_classifier, Activation, Layer},
    optim::update,
    params::{Init, ParameterSnapshot},
    tensor::Tensor,
    utils,
  };

  fn config(num_updates: usize, eval_interval: usize) -> TrainConfig {
    TrainConfig {
      num_updates,
      eval_interval,
      sample_width: 8,
      ..TrainConfig::default()
    }
  }

  #[test]
  fn evaluates_once_per_interval() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 8, &mut rng).unwrap();
    let dataset = Dataset::synthetic(20, 10, 8).unwrap();
    let mut trainer = Trainer::new(config(25, 10), EngineKind::Autodiff.build()).unwrap();
    let report = trainer.run(&network, &mut store, &dataset, &mut rng).unwrap();
    let steps: Vec<_> = report.evaluations.iter().map(|e| e.step).collect();
    assert_eq!(steps, [10, 20]);
    assert_eq!(trainer.phase(), Phase::Done);
    assert_eq!(report.parameters.len(), 6);
    assert!(report.final_loss.is_finite());
  }

  /// Wraps autodiff and records, per call, the store it was handed and the store it
  /// expects to be handed next. Any write outside the SGD step shows up as a mismatch.
  struct Spy {
    inner: Autodiff,
    lr: f32,
    log: Rc<RefCell<Vec<(Vec<ParameterSnapshot>, Vec<ParameterSnapshot>)>>>,
  }

  impl GradientEngine for Spy {
    fn name(&self) -> &'static str {
      "spy"
    }

    fn compute(
      &mut self,
      network: &Network,
      store: &ParameterStore,
      batch: &Batch,
    ) -> Result<Gradients> {
      let g = self.inner.compute(network, store, batch)?;
      let mut expected = store.clone();
      update(&mut expected, &g.grads, self.lr)?;
      self.log.borrow_mut().push((store.snapshot(), expected.snapshot()));
      Ok(g)
    }
  }

  #[test]
  fn evaluation_never_touches_parameters() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 8, &mut rng).unwrap();
    let dataset = Dataset::synthetic(20, 10, 8).unwrap();
    let cfg = config(6, 2);
    let log = Rc::new(RefCell::new(vec![]));
    let spy = Spy {
      inner: Autodiff,
      lr: cfg.learning_rate,
      log: log.clone(),
    };
    let mut trainer = Trainer::new(cfg, Box::new(spy)).unwrap();
    let report = trainer.run(&network, &mut store, &dataset, &mut rng).unwrap();
    assert_eq!(report.evaluations.len(), 3);
    let log = log.borrow();
    assert_eq!(log.len(), 6);
    for pair in log.windows(2) {
      assert_eq!(pair[0].1, pair[1].0);
    }
    assert_eq!(log[5].1, store.snapshot());
  }

  struct Exploding;

  impl GradientEngine for Exploding {
    fn name(&self) -> &'static str {
      "exploding"
    }

    fn compute(&mut self, _: &Network, store: &ParameterStore, _: &Batch) -> Result<Gradients> {
      Ok(Gradients {
        loss: f32::NAN,
        grads: store
          .get_all()
          .iter()
          .map(|p| Tensor::zeros(p.value.shape().to_vec()))
          .collect(),
      })
    }
  }

  #[test]
  fn non_finite_loss_is_fatal() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 8, &mut rng).unwrap();
    let dataset = Dataset::synthetic(4, 2, 8).unwrap();
    let mut trainer = Trainer::new(config(3, 1), Box::new(Exploding)).unwrap();
    let result = trainer.run(&network, &mut store, &dataset, &mut rng);
    assert!(matches!(result, Err(Error::NumericInstability(_))));
  }

  /// Finite loss, but the first parameter's gradient is NaN.
  struct NanGradient;

  impl GradientEngine for NanGradient {
    fn name(&self) -> &'static str {
      "nan-gradient"
    }

    fn compute(&mut self, _: &Network, store: &ParameterStore, _: &Batch) -> Result<Gradients> {
      let mut grads: Vec<Tensor> = store
        .get_all()
        .iter()
        .map(|p| Tensor::zeros(p.value.shape().to_vec()))
        .collect();
      grads[0].data_mut()[0] = f32::NAN;
      Ok(Gradients { loss: 0.25, grads })
    }
  }

  #[test]
  fn non_finite_gradient_is_fatal_and_never_applied() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 8, &mut rng).unwrap();
    let before = store.snapshot();
    let dataset = Dataset::synthetic(4, 2, 8).unwrap();
    let mut trainer = Trainer::new(config(3, 1), Box::new(NanGradient)).unwrap();
    let result = trainer.run(&network, &mut store, &dataset, &mut rng);
    assert!(matches!(result, Err(Error::NumericInstability(_))));
    assert_eq!(trainer.phase(), Phase::Done);
    assert_eq!(store.snapshot(), before);
  }

  #[test]
  fn saturation_is_reported_once() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    // all-ones rows drive the sigmoid to 800 and pin it at the upper clamp
    let weight = store.initialize("w", &[8, 1], Init::Fill(100.0), &mut rng).unwrap();
    let network = Network::new(
      &store,
      vec![Layer {
        weight,
        bias: None,
        activation: Activation::Sigmoid,
      }],
    )
    .unwrap();
    let dataset = Dataset::synthetic(4, 4, 8).unwrap();
    let mut trainer = Trainer::new(config(6, 2), Box::new(Autodiff)).unwrap();
    assert_eq!(trainer.saturation_reported_at, None);
    let report = trainer.run(&network, &mut store, &dataset, &mut rng).unwrap();
    assert_eq!(report.evaluations.len(), 3);
    // saturated at every evaluation, reported only at the first
    assert_eq!(trainer.saturation_reported_at, Some(2));
  }

  #[test]
  fn unsaturated_run_reports_nothing() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 8, &mut rng).unwrap();
    let dataset = Dataset::synthetic(4, 4, 8).unwrap();
    let mut trainer = Trainer::new(config(4, 2), Box::new(Autodiff)).unwrap();
    trainer.run(&network, &mut store, &dataset, &mut rng).unwrap();
    assert_eq!(trainer.saturation_reported_at, None);
  }

  #[test]
  fn width_mismatch_is_a_shape_error() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 8, &mut rng).unwrap();
    let dataset = Dataset::synthetic(4, 2, 9).unwrap();
    let mut trainer = Trainer::new(config(3, 1), Box::new(Autodiff)).unwrap();
    let result = trainer.run(&network, &mut store, &dataset, &mut rng);
    assert!(matches!(result, Err(Error::Shape(_))));
  }

  /// 1200 -> 256 -> 64 -> 1, batch 16, lr 0.01, 5000 updates on zeros vs ones.
  #[test]
  fn learns_a_separable_task() {
    let _guard = utils::init_logging_tests();
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 1200, &mut rng).unwrap();
    let dataset = Dataset::synthetic(1000, 200, 1200).unwrap();
    let cfg = TrainConfig {
      batch_size: 16,
      learning_rate: 0.01,
      num_updates: 5000,
      eval_interval: 1000,
      sample_width: 1200,
      seed: 0,
    };
    let mut trainer = Trainer::new(cfg, EngineKind::Autodiff.build()).unwrap();
    let report = trainer.run(&network, &mut store, &dataset, &mut rng).unwrap();
    assert_eq!(report.evaluations.len(), 5);
    let last = report.evaluations.last().unwrap();
    assert!(last.accuracy >= 0.95, "accuracy {}", last.accuracy);
  }
}
