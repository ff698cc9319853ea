//! Dense row-major `f32` tensors with just the operations a dense network needs.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
  shape: Vec<usize>,
  data: Vec<f32>,
}

impl Tensor {
  /// Fails when `data` does not hold exactly `shape.iter().product()` elements.
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
      return Err(Error::shape(format!(
        "shape {:?} needs {} elements, got {}",
        shape,
        expected,
        data.len()
      )));
    }
    Ok(Tensor { shape, data })
  }

  pub fn zeros(shape: Vec<usize>) -> Self {
    let len = shape.iter().product();
    Tensor {
      shape,
      data: vec![0.0; len],
    }
  }

  pub fn full(shape: Vec<usize>, value: f32) -> Self {
    let len = shape.iter().product();
    Tensor {
      shape,
      data: vec![value; len],
    }
  }

  /// A one-element tensor of shape `[1]`.
  pub fn scalar(value: f32) -> Self {
    Tensor {
      shape: vec![1],
      data: vec![value],
    }
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn rank(&self) -> usize {
    self.shape.len()
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }

  pub fn is_finite(&self) -> bool {
    self.data.iter().all(|v| v.is_finite())
  }

  fn dims2(&self, what: &str) -> Result<(usize, usize)> {
    match self.shape[..] {
      [rows, cols] => Ok((rows, cols)),
      _ => Err(Error::shape(format!(
        "{} expects a rank-2 tensor, got shape {:?}",
        what, self.shape
      ))),
    }
  }

  pub fn row(&self, i: usize) -> Result<&[f32]> {
    let (rows, cols) = self.dims2("row")?;
    if i >= rows {
      return Err(Error::shape(format!("row {} out of range for {} rows", i, rows)));
    }
    Ok(&self.data[i * cols..(i + 1) * cols])
  }

  /// Gathers the given rows, in order, into a new `[indices.len(), cols]` tensor.
  pub fn select_rows(&self, indices: &[usize]) -> Result<Tensor> {
    let (_, cols) = self.dims2("select_rows")?;
    let mut data = Vec::with_capacity(indices.len() * cols);
    for &i in indices {
      data.extend_from_slice(self.row(i)?);
    }
    Tensor::new(vec![indices.len(), cols], data)
  }

  pub fn reshape(&self, shape: Vec<usize>) -> Result<Tensor> {
    Tensor::new(shape, self.data.clone())
  }

  /// `[n, 1]` becomes `[n]`; every other shape is returned unchanged.
  pub fn squeeze_last(self) -> Tensor {
    if self.rank() == 2 && self.shape[1] == 1 {
      Tensor {
        shape: vec![self.shape[0]],
        data: self.data,
      }
    } else {
      self
    }
  }

  /// `[n, k] · [k, m] -> [n, m]`
  pub fn matmul(&self, rhs: &Tensor) -> Result<Tensor> {
    let (n, k) = self.dims2("matmul")?;
    let (k2, m) = rhs.dims2("matmul")?;
    if k != k2 {
      return Err(Error::shape(format!(
        "cannot multiply {:?} by {:?}",
        self.shape, rhs.shape
      )));
    }
    let mut out = vec![0.0f32; n * m];
    for (lhs_row, out_row) in self.data.chunks_exact(k.max(1)).zip(out.chunks_exact_mut(m.max(1))) {
      for (a, rhs_row) in lhs_row.iter().zip(rhs.data.chunks_exact(m.max(1))) {
        for (o, b) in out_row.iter_mut().zip(rhs_row) {
          *o += a * b;
        }
      }
    }
    Tensor::new(vec![n, m], out)
  }

  pub fn transpose(&self) -> Result<Tensor> {
    let (rows, cols) = self.dims2("transpose")?;
    let mut out = vec![0.0f32; rows * cols];
    for (i, j) in (0..rows).cartesian_product(0..cols) {
      out[j * rows + i] = self.data[i * cols + j];
    }
    Tensor::new(vec![cols, rows], out)
  }

  /// Adds a `[m]` row to every row of a `[n, m]` tensor.
  pub fn add_row(&self, row: &Tensor) -> Result<Tensor> {
    let (_, cols) = self.dims2("add_row")?;
    if row.shape != [cols] {
      return Err(Error::shape(format!(
        "cannot broadcast {:?} over rows of {:?}",
        row.shape, self.shape
      )));
    }
    let mut out = self.data.clone();
    for out_row in out.chunks_exact_mut(cols.max(1)) {
      for (o, b) in out_row.iter_mut().zip(&row.data) {
        *o += b;
      }
    }
    Tensor::new(self.shape.clone(), out)
  }

  /// Column sums: `[n, m] -> [m]`.
  pub fn sum_rows(&self) -> Result<Tensor> {
    let (_, cols) = self.dims2("sum_rows")?;
    let mut out = vec![0.0f32; cols];
    for row in self.data.chunks_exact(cols.max(1)) {
      for (o, v) in out.iter_mut().zip(row) {
        *o += v;
      }
    }
    Tensor::new(vec![cols], out)
  }

  pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
    Tensor {
      shape: self.shape.clone(),
      data: self.data.iter().map(|&v| f(v)).collect(),
    }
  }

  pub fn zip_map(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Result<Tensor> {
    if self.shape != other.shape {
      return Err(Error::shape(format!(
        "elementwise op on mismatched shapes {:?} and {:?}",
        self.shape, other.shape
      )));
    }
    Ok(Tensor {
      shape: self.shape.clone(),
      data: self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect(),
    })
  }

  /// In-place `self += other`.
  pub fn accumulate(&mut self, other: &Tensor) -> Result<()> {
    if self.shape != other.shape {
      return Err(Error::shape(format!(
        "cannot accumulate {:?} into {:?}",
        other.shape, self.shape
      )));
    }
    for (a, b) in self.data.iter_mut().zip(&other.data) {
      *a += b;
    }
    Ok(())
  }
}

impl fmt::Display for Tensor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "f32 [{}]", self.shape.iter().join(", "))
  }
}
