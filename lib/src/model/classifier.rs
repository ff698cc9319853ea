use rand::Rng;

use super::{Activation, Network};
use crate::{
  error::Result,
  params::{Init, ParameterStore},
};

pub const HIDDEN_WIDTHS: [usize; 2] = [256, 64];

/// Binary classifier `sample_width -> 256 -> 64 -> 1` with relu, relu, sigmoid.
pub fn genre_classifier<R: Rng + ?Sized>(
  store: &mut ParameterStore,
  sample_width: usize,
  rng: &mut R,
) -> Result<Network> {
  Network::dense(
    store,
    &[sample_width, HIDDEN_WIDTHS[0], HIDDEN_WIDTHS[1], 1],
    &[Activation::Relu, Activation::Relu, Activation::Sigmoid],
    Init::small_gaussian(),
    rng,
  )
}
