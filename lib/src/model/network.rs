use rand::Rng;
use tracing::instrument;

use super::Activation;
use crate::{
  error::{Error, Result},
  params::{Init, ParamId, ParameterStore},
  tensor::Tensor,
};

/// `activation(inputs · weight + bias)`; the bias is optional so a bare linear map fits too.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
  pub weight: ParamId,
  pub bias: Option<ParamId>,
  pub activation: Activation,
}

/// Fixed stack of dense layers. Holds only ids; values live in a [`ParameterStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
  input_width: usize,
  output_width: usize,
  layers: Vec<Layer>,
}

impl Network {
  /// Checks that consecutive layers chain against the shapes in `store`.
  pub fn new(store: &ParameterStore, layers: Vec<Layer>) -> Result<Self> {
    let first = layers
      .first()
      .ok_or_else(|| Error::shape("a network needs at least one layer"))?;
    let input_width = weight_dims(store, first.weight)?.0;
    let mut width = input_width;
    for (i, layer) in layers.iter().enumerate() {
      let (rows, cols) = weight_dims(store, layer.weight)?;
      if rows != width {
        return Err(Error::shape(format!(
          "layer {} expects width {}, previous layer produces {}",
          i, rows, width
        )));
      }
      if let Some(bias) = layer.bias {
        let shape = store.value(bias)?.shape();
        if *shape != [cols] {
          return Err(Error::shape(format!(
            "layer {} bias has shape {:?}, expected [{}]",
            i, shape, cols
          )));
        }
      }
      width = cols;
    }
    Ok(Network {
      input_width,
      output_width: width,
      layers,
    })
  }

  /// Dense layers of the given widths, every parameter drawn from `init`.
  /// Parameters are named `w1, b1, w2, b2, ...`.
  pub fn dense<R: Rng + ?Sized>(
    store: &mut ParameterStore,
    widths: &[usize],
    activations: &[Activation],
    init: Init,
    rng: &mut R,
  ) -> Result<Self> {
    if widths.len() != activations.len() + 1 {
      return Err(Error::shape(format!(
        "{} widths cannot describe {} layers",
        widths.len(),
        activations.len()
      )));
    }
    let mut layers = Vec::with_capacity(activations.len());
    for (i, (pair, &activation)) in widths.windows(2).zip(activations).enumerate() {
      let weight = store.initialize(
        &format!("w{}", i + 1),
        &[pair[0], pair[1]],
        init.clone(),
        rng,
      )?;
      let bias = store.initialize(&format!("b{}", i + 1), &[pair[1]], init.clone(), rng)?;
      layers.push(Layer {
        weight,
        bias: Some(bias),
        activation,
      });
    }
    Network::new(store, layers)
  }

  pub fn input_width(&self) -> usize {
    self.input_width
  }

  pub fn output_width(&self) -> usize {
    self.output_width
  }

  pub fn layers(&self) -> &[Layer] {
    &self.layers
  }

  pub fn output_activation(&self) -> Activation {
    self
      .layers
      .last()
      .map(|l| l.activation)
      .unwrap_or(Activation::Identity)
  }

  pub(crate) fn check_inputs(&self, inputs: &Tensor) -> Result<()> {
    match inputs.shape() {
      [_, width] if *width == self.input_width => Ok(()),
      shape => Err(Error::shape(format!(
        "network takes [batch, {}] inputs, got {:?}",
        self.input_width, shape
      ))),
    }
  }

  /// Predictions for a `[batch, input_width]` tensor. Single-output networks
  /// return `[batch]`, wider ones `[batch, output_width]`.
  #[instrument(level = "trace", skip_all)]
  pub fn forward(&self, store: &ParameterStore, inputs: &Tensor) -> Result<Tensor> {
    self.check_inputs(inputs)?;
    let mut current = inputs.clone();
    for layer in &self.layers {
      let mut z = current.matmul(store.value(layer.weight)?)?;
      if let Some(bias) = layer.bias {
        z = z.add_row(store.value(bias)?)?;
      }
      current = z.map(|v| layer.activation.apply(v));
    }
    Ok(current.squeeze_last())
  }

  /// How many predictions sit on the output activation's clamp bounds.
  pub fn saturated(&self, predictions: &Tensor) -> usize {
    let activation = self.output_activation();
    predictions
      .data()
      .iter()
      .filter(|&&y| activation.is_saturated(y))
      .count()
  }
}

fn weight_dims(store: &ParameterStore, id: ParamId) -> Result<(usize, usize)> {
  match store.value(id)?.shape() {
    &[rows, cols] => Ok((rows, cols)),
    shape => Err(Error::shape(format!(
      "weight {:?} must be a matrix, got shape {:?}",
      id, shape
    ))),
  }
}
