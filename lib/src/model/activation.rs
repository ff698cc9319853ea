use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest `f32` strictly below one.
pub const SIGMOID_CEIL: f32 = 1.0 - f32::EPSILON / 2.0;
/// Smallest normal positive `f32`.
pub const SIGMOID_FLOOR: f32 = f32::MIN_POSITIVE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
  Identity,
  Relu,
  Sigmoid,
}

impl Activation {
  pub fn apply(self, v: f32) -> f32 {
    match self {
      Activation::Identity => v,
      Activation::Relu => relu(v),
      Activation::Sigmoid => sigmoid(v),
    }
  }

  /// Derivative at pre-activation `x`, given the output `y = apply(x)`.
  pub fn derivative(self, x: f32, y: f32) -> f32 {
    match self {
      Activation::Identity => 1.0,
      Activation::Relu => {
        if x > 0.0 {
          1.0
        } else {
          0.0
        }
      }
      Activation::Sigmoid => y * (1.0 - y),
    }
  }

  /// Whether an output sits on a clamp bound, i.e. the activation has saturated.
  pub fn is_saturated(self, y: f32) -> bool {
    matches!(self, Activation::Sigmoid) && (y <= SIGMOID_FLOOR || y >= SIGMOID_CEIL)
  }
}

impl fmt::Display for Activation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Activation::Identity => "identity",
      Activation::Relu => "relu",
      Activation::Sigmoid => "sigmoid",
    };
    f.write_str(name)
  }
}

pub fn relu(v: f32) -> f32 {
  v.max(0.0)
}

/// Logistic function. `exp` is only ever taken of a non-positive number, and the
/// result is clamped so it stays strictly inside (0, 1) for every finite input.
pub fn sigmoid(v: f32) -> f32 {
  let y = if v >= 0.0 {
    1.0 / (1.0 + (-v).exp())
  } else {
    let e = v.exp();
    e / (1.0 + e)
  };
  y.clamp(SIGMOID_FLOOR, SIGMOID_CEIL)
}
