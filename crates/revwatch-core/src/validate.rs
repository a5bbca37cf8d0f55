//! Validation of raw review items.
//!
//! Used for both connector results and backfill payloads. A failure rejects
//! that single item; callers keep going with the rest of the batch.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::{review::ReviewContent, source::RawReview};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
  #[error("item is not a JSON object")]
  NotAnObject,

  #[error("missing external review id")]
  MissingExternalId,

  #[error("missing rating")]
  MissingRating,

  #[error("rating is not numeric: {0}")]
  NonNumericRating(String),

  #[error("rating {0} is outside 1..=5")]
  RatingOutOfRange(f64),

  #[error("rating {0} is not a whole star")]
  FractionalRating(f64),

  #[error("invalid published_at: {0}")]
  InvalidPublishedAt(String),
}

/// Parse a loosely-shaped JSON review (as accepted by backfill) into a
/// [`RawReview`]. The original value is kept as the raw payload.
///
/// Accepted keys: `external_review_id` | `review_id` | `id`,
/// `author_name` | `author`, `rating` | `stars` (number or numeric string),
/// `comment` | `text`, `review_published_at` | `published_at` (RFC 3339).
pub fn parse_raw_review(value: &Value) -> Result<RawReview, ValidationError> {
  let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
  let pick = |keys: &[&str]| {
    keys
      .iter()
      .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
  };

  let external_review_id = match pick(&["external_review_id", "review_id", "id"]) {
    Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_owned(),
    Some(Value::Number(n)) => n.to_string(),
    _ => return Err(ValidationError::MissingExternalId),
  };

  let rating = match pick(&["rating", "stars"]) {
    None => return Err(ValidationError::MissingRating),
    Some(Value::Number(n)) => n
      .as_f64()
      .ok_or_else(|| ValidationError::NonNumericRating(n.to_string()))?,
    Some(Value::String(s)) => s
      .trim()
      .parse::<f64>()
      .map_err(|_| ValidationError::NonNumericRating(s.clone()))?,
    Some(other) => return Err(ValidationError::NonNumericRating(other.to_string())),
  };
  if !rating.is_finite() {
    return Err(ValidationError::NonNumericRating(rating.to_string()));
  }

  let text = |keys: &[&str]| pick(keys).and_then(Value::as_str).map(str::to_owned);

  let review_published_at = match pick(&["review_published_at", "published_at"]) {
    None => None,
    Some(Value::String(s)) => Some(
      DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidPublishedAt(e.to_string()))?,
    ),
    Some(other) => return Err(ValidationError::InvalidPublishedAt(other.to_string())),
  };

  Ok(RawReview {
    external_review_id,
    author_name: text(&["author_name", "author"]),
    rating,
    comment: text(&["comment", "text"]),
    review_published_at,
    raw_payload: value.clone(),
  })
}

/// Check a [`RawReview`] and turn it into hashable [`ReviewContent`] for
/// `place_id`. The rating must be a whole star in `1..=5`, so the stored
/// value is exactly the source value.
pub fn validate_content(
  place_id: &str,
  raw: &RawReview,
) -> Result<ReviewContent, ValidationError> {
  let external_review_id = raw.external_review_id.trim();
  if external_review_id.is_empty() {
    return Err(ValidationError::MissingExternalId);
  }
  if !raw.rating.is_finite() {
    return Err(ValidationError::NonNumericRating(raw.rating.to_string()));
  }
  if !(1.0..=5.0).contains(&raw.rating) {
    return Err(ValidationError::RatingOutOfRange(raw.rating));
  }
  if raw.rating.fract() != 0.0 {
    return Err(ValidationError::FractionalRating(raw.rating));
  }

  Ok(ReviewContent {
    place_id:           place_id.to_owned(),
    external_review_id: external_review_id.to_owned(),
    author_name:        raw.author_name.clone(),
    rating:             raw.rating as u8,
    comment:            raw.comment.clone(),
    published_at:       raw.review_published_at,
  })
}
