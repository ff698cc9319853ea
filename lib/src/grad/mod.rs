//! Gradient engines: anything that can produce `d loss / d parameter` for every
//! parameter of a network, evaluated at the store's current values on one batch.
//!
//! Two engines share one contract:
//!  - [`Autodiff`] records the forward pass as a graph and runs reverse mode. Cost is
//!    roughly two forward passes regardless of the parameter count.
//!  - [`FiniteDifference`] perturbs one scalar at a time. Cost is two forward passes
//!    *per scalar parameter*, and the difference quotient of two nearby `f32` losses
//!    loses precision as the network grows. Use it only for toy models and checks.

pub mod autodiff;
pub mod finite_difference;

pub use autodiff::*;
pub use finite_difference::*;

use crate::{data::Batch, error::Result, model::Network, params::ParameterStore, tensor::Tensor};

/// Batch loss plus one gradient per parameter, aligned with [`ParameterStore::get_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
  pub loss: f32,
  pub grads: Vec<Tensor>,
}

pub trait GradientEngine {
  fn name(&self) -> &'static str;

  fn compute(
    &mut self,
    network: &Network,
    store: &ParameterStore,
    batch: &Batch,
  ) -> Result<Gradients>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
  #[default]
  Autodiff,
  FiniteDifference,
}

impl EngineKind {
  pub fn build(self) -> Box<dyn GradientEngine> {
    match self {
      EngineKind::Autodiff => Box::new(Autodiff::default()),
      EngineKind::FiniteDifference => Box::new(FiniteDifference::default()),
    }
  }
}

#[cfg(test)]
mod tests {
  use rand::{rngs::StdRng, SeedableRng};

  use super::*;
  use crate::{
    data::Dataset,
    model::{genre_classifier, Activation, Layer},
    params::Init,
  };

  fn close(a: f32, b: f32, rel: f32) -> bool {
    (a - b).abs() <= rel * a.abs().max(b.abs()).max(1e-3)
  }

  /// `y = w * x`, loss `(target - y)^2`, so `dL/dw = -2 x (target - w x)`.
  #[test]
  fn single_weight_gradient_sign() {
    for &(x, target, w) in &[(2.0f32, 3.0f32, 0.5f32), (-1.5, 4.0, 2.0), (0.75, -2.0, -1.0)] {
      let mut rng = StdRng::seed_from_u64(0);
      let mut store = ParameterStore::new();
      let weight = store.initialize("w", &[1, 1], Init::Values(vec![w]), &mut rng).unwrap();
      let network = Network::new(
        &store,
        vec![Layer {
          weight,
          bias: None,
          activation: Activation::Identity,
        }],
      )
      .unwrap();
      let batch = Batch {
        inputs: Tensor::new(vec![1, 1], vec![x]).unwrap(),
        targets: Tensor::new(vec![1], vec![target]).unwrap(),
      };
      let expected = -2.0 * x * (target - w * x);

      let ad = Autodiff::default().compute(&network, &store, &batch).unwrap();
      let fd = FiniteDifference::default().compute(&network, &store, &batch).unwrap();
      assert!(close(ad.grads[0].data()[0], expected, 1e-5), "autodiff {:?} vs {}", ad, expected);
      assert!(close(fd.grads[0].data()[0], expected, 1e-3), "finite diff {:?} vs {}", fd, expected);
      assert!(close(ad.grads[0].data()[0], fd.grads[0].data()[0], 1e-3));
      assert!(close(ad.loss, fd.loss, 1e-6));
    }
  }

  fn assert_engines_agree(network: &Network, store: &ParameterStore, batch: &Batch) {
    let ad = Autodiff::default().compute(network, store, batch).unwrap();
    let fd = FiniteDifference::default().compute(network, store, batch).unwrap();
    assert_eq!(ad.grads.len(), store.len());
    assert_eq!(fd.grads.len(), store.len());
    for ((a, f), p) in ad.grads.iter().zip(&fd.grads).zip(store.get_all()) {
      assert_eq!(a.shape(), p.value.shape());
      assert_eq!(f.shape(), p.value.shape());
      for (x, y) in a.data().iter().zip(f.data()) {
        assert!((x - y).abs() < 2e-3, "{}: autodiff {} vs finite diff {}", p.name, x, y);
      }
    }
  }

  #[test]
  fn engines_agree_on_a_smooth_mlp() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut store = ParameterStore::new();
    let network = Network::dense(
      &mut store,
      &[3, 4, 1],
      &[Activation::Sigmoid, Activation::Sigmoid],
      Init::Gaussian { std: 0.5 },
      &mut rng,
    )
    .unwrap();
    let batch = Batch {
      inputs: Tensor::new(
        vec![4, 3],
        vec![0.3, -0.2, 0.9, 1.0, 0.5, -0.4, -0.7, 0.1, 0.2, 0.6, 0.6, -0.9],
      )
      .unwrap(),
      targets: Tensor::new(vec![4], vec![0.0, 1.0, 0.0, 1.0]).unwrap(),
    };
    assert_engines_agree(&network, &store, &batch);
  }

  #[test]
  fn engines_agree_through_relu() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut store = ParameterStore::new();
    let w1 = store
      .initialize("w1", &[2, 2], Init::Values(vec![1.0, -1.0, 0.5, 2.0]), &mut rng)
      .unwrap();
    let b1 = store.initialize("b1", &[2], Init::Values(vec![0.1, -0.3]), &mut rng).unwrap();
    let w2 = store.initialize("w2", &[2, 1], Init::Values(vec![0.7, -0.4]), &mut rng).unwrap();
    let b2 = store.initialize("b2", &[1], Init::Values(vec![0.05]), &mut rng).unwrap();
    let network = Network::new(
      &store,
      vec![
        Layer {
          weight: w1,
          bias: Some(b1),
          activation: Activation::Relu,
        },
        Layer {
          weight: w2,
          bias: Some(b2),
          activation: Activation::Identity,
        },
      ],
    )
    .unwrap();
    // pre-activations [2.1, 2.7] and [-0.65, 1.7], all clear of the kink
    let batch = Batch {
      inputs: Tensor::new(vec![2, 2], vec![1.0, 2.0, -1.0, 0.5]).unwrap(),
      targets: Tensor::new(vec![2], vec![1.0, 0.0]).unwrap(),
    };
    assert_engines_agree(&network, &store, &batch);

    // the second example has hidden unit 0 switched off, so column 0 of w1 only
    // sees the first: y = 0.44, dL/dy = -0.56, delta = dL/dy * w2 = [-0.392, 0.224]
    let ad = Autodiff::default().compute(&network, &store, &batch).unwrap();
    let dw1 = ad.grads[0].data();
    assert!((dw1[0] - -0.392).abs() < 1e-5, "{:?}", dw1);
    assert!((dw1[2] - -0.784).abs() < 1e-5, "{:?}", dw1);
  }

  #[test]
  fn engine_kind_builds_matching_engine() {
    assert_eq!(EngineKind::Autodiff.build().name(), "autodiff");
    assert_eq!(EngineKind::FiniteDifference.build().name(), "finite-difference");
  }

  #[test]
  fn gradients_match_parameter_order_for_classifier() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut store = ParameterStore::new();
    let network = genre_classifier(&mut store, 12, &mut rng).unwrap();
    let data = Dataset::synthetic(8, 2, 12).unwrap();
    let batch = data.sample_batch(4, &mut rng).unwrap();
    let grads = Autodiff::default().compute(&network, &store, &batch).unwrap();
    let shapes: Vec<_> = grads.grads.iter().map(|g| g.shape().to_vec()).collect();
    let expected: Vec<_> = store.get_all().iter().map(|p| p.value.shape().to_vec()).collect();
    assert_eq!(shapes, expected);
  }
}
