//! The review-source seam.
//!
//! A source returns the most recent reviews for one place. Sources are
//! external collaborators; the engine only relies on this contract.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A review as delivered by a source, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
  pub external_review_id:  String,
  pub author_name:         Option<String>,
  /// Expected within `1..=5`; checked by [`crate::validate::validate_content`].
  pub rating:              f64,
  pub comment:             Option<String>,
  pub review_published_at: Option<DateTime<Utc>>,
  /// The untouched source record.
  #[serde(default)]
  pub raw_payload:         serde_json::Value,
}

/// Abstraction over an external review provider.
///
/// An empty result is legitimate and never treated as a failure. Callers
/// bound each call with their own timeout.
pub trait ReviewSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch at most `limit` recent reviews for `place_id`.
  fn fetch<'a>(
    &'a self,
    place_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RawReview>, Self::Error>> + Send + 'a;
}
