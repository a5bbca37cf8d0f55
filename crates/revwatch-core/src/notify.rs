//! The notification seam.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  /// `None` when the tenant has no usable recipient configured.
  pub to:      Option<String>,
  pub subject: String,
  pub body:    String,
}

/// What a transport did with a message it did not reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendOutcome {
  Sent,
  /// The transport deliberately did nothing (no recipient, no transport).
  Skipped,
}

/// Delivers a single [`Notification`]. An `Err` marks the alert row as
/// failed; both `Ok` outcomes mark it sent.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    message: &'a Notification,
  ) -> impl Future<Output = Result<SendOutcome, Self::Error>> + Send + 'a;
}
