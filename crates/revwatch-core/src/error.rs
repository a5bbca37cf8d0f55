//! Error types for `revwatch-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown review status: {0:?}")]
  UnknownReviewStatus(String),

  #[error("unknown action type: {0:?}")]
  UnknownActionType(String),

  #[error("unknown alert type: {0:?}")]
  UnknownAlertType(String),

  #[error("unknown send status: {0:?}")]
  UnknownSendStatus(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
