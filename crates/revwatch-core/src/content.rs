//! Content hashing for change detection.
//!
//! The digest is SHA-256 over the ordered tuple `(place_id,
//! external_review_id, author_name, rating, comment, published_at)`. Every
//! field is written with a presence byte and a length prefix, so the encoding
//! is unambiguous and an absent field never collides with an empty one.

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::review::ReviewContent;

/// Compute the lowercase hex content hash for `content`.
pub fn content_hash(content: &ReviewContent) -> String {
  let mut hasher = Sha256::new();
  write_str(&mut hasher, Some(&content.place_id));
  write_str(&mut hasher, Some(&content.external_review_id));
  write_str(&mut hasher, content.author_name.as_deref());
  hasher.update([content.rating]);
  write_str(&mut hasher, content.comment.as_deref());
  match content.published_at {
    Some(ts) => {
      hasher.update([1u8]);
      hasher.update(ts.timestamp_micros().to_le_bytes());
    }
    None => hasher.update([0u8]),
  }
  hex::encode(hasher.finalize())
}

/// The JSON snapshot stored alongside a version row.
pub fn snapshot(content: &ReviewContent) -> serde_json::Value {
  json!({
    "place_id":           content.place_id,
    "external_review_id": content.external_review_id,
    "author_name":        content.author_name,
    "rating":             content.rating,
    "comment":            content.comment,
    "published_at":       content.published_at.map(|ts| ts.to_rfc3339()),
  })
}

fn write_str(hasher: &mut Sha256, value: Option<&str>) {
  match value {
    Some(s) => {
      hasher.update([1u8]);
      hasher.update((s.len() as u64).to_le_bytes());
      hasher.update(s.as_bytes());
    }
    None => hasher.update([0u8]),
  }
}
