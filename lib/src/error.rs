use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a training run.
#[derive(Debug, Error)]
pub enum Error {
  /// Tensor or parameter shapes do not line up. Never recoverable.
  #[error("shape error: {0}")]
  Shape(String),

  /// The dataset file is missing, malformed or inconsistent.
  #[error("failed to load dataset {path:?}: {reason}")]
  DataLoad { path: PathBuf, reason: String },

  /// The loss went non-finite; the model needs reinitialisation.
  #[error("numeric instability: {0}")]
  NumericInstability(String),

  /// A run configuration that cannot work.
  #[error("invalid configuration: {0}")]
  Config(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error("graphml export produced invalid utf-8")]
  GraphMl(#[from] std::string::FromUtf8Error),
}

impl Error {
  pub(crate) fn shape(msg: impl Into<String>) -> Self {
    Error::Shape(msg.into())
  }

  pub(crate) fn data_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Error::DataLoad {
      path: path.into(),
      reason: reason.into(),
    }
  }
}
