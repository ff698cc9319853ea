use crate::{
  error::{Error, Result},
  tensor::Tensor,
};

fn check(predictions: &Tensor, targets: &Tensor) -> Result<()> {
  if predictions.shape() != targets.shape() || predictions.is_empty() {
    return Err(Error::shape(format!(
      "loss needs equal non-empty shapes, got predictions {:?} and targets {:?}",
      predictions.shape(),
      targets.shape()
    )));
  }
  Ok(())
}

/// `mean((target - prediction)^2)`
pub fn mse(predictions: &Tensor, targets: &Tensor) -> Result<f32> {
  check(predictions, targets)?;
  let sum: f32 = predictions
    .data()
    .iter()
    .zip(targets.data())
    .map(|(p, t)| (t - p) * (t - p))
    .sum();
  Ok(sum / predictions.len() as f32)
}

/// Derivative of [`mse`] with respect to each prediction: `-2 (target - prediction) / n`.
pub fn mse_grad(predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
  check(predictions, targets)?;
  let n = predictions.len() as f32;
  predictions.zip_map(targets, |p, t| -2.0 * (t - p) / n)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exact_predictions_cost_nothing() {
    let t = Tensor::new(vec![4], vec![0.0, 1.0, 1.0, 0.0]).unwrap();
    assert_eq!(mse(&t, &t).unwrap(), 0.0);
    assert!(mse_grad(&t, &t).unwrap().data().iter().all(|&g| g == 0.0));
  }

  #[test]
  fn mean_of_squares() {
    let p = Tensor::new(vec![2], vec![1.0, 3.0]).unwrap();
    let t = Tensor::new(vec![2], vec![0.0, 1.0]).unwrap();
    assert_eq!(mse(&p, &t).unwrap(), 2.5);
    assert_eq!(mse_grad(&p, &t).unwrap().data(), &[1.0, 2.0]);
  }

  #[test]
  fn shape_mismatch() {
    let p = Tensor::zeros(vec![2, 1]);
    let t = Tensor::zeros(vec![2]);
    assert!(matches!(mse(&p, &t), Err(Error::Shape(_))));
  }
}
