//! HTTP review connector.
//!
//! `GET {base_url}/places/{place_id}/reviews?limit={n}` with an optional
//! bearer key. The response is either a JSON array of review objects or an
//! object with a `reviews` array.

use std::time::Duration;

use reqwest::{Client, Url};
use revwatch_core::{
  source::{RawReview, ReviewSource},
  validate::parse_raw_review,
};
use serde_json::Value;
use thiserror::Error;

use crate::config::SourceConfig;

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("invalid source url: {0}")]
  Url(String),

  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("unexpected response shape")]
  Shape,
}

/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpReviewSource {
  client:   Client,
  base_url: Url,
  api_key:  Option<String>,
}

impl HttpReviewSource {
  pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
    let base_url = Url::parse(&config.base_url).map_err(|e| SourceError::Url(e.to_string()))?;
    if base_url.cannot_be_a_base() {
      return Err(SourceError::Url(config.base_url.clone()));
    }
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs.max(1)))
      .build()?;
    Ok(Self { client, base_url, api_key: config.api_key.clone() })
  }

  fn reviews_url(&self, place_id: &str, limit: usize) -> Result<Url, SourceError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| SourceError::Url(self.base_url.to_string()))?
      .pop_if_empty()
      .extend(["places", place_id, "reviews"]);
    url.query_pairs_mut().append_pair("limit", &limit.to_string());
    Ok(url)
  }
}

/// Pull review items out of a response body. Items that fail validation are
/// logged and dropped so one bad record never costs the whole place.
fn extract_items(place_id: &str, body: Value) -> Result<Vec<RawReview>, SourceError> {
  let items = match body {
    Value::Array(items) => items,
    Value::Object(mut obj) => match obj.remove("reviews") {
      Some(Value::Array(items)) => items,
      _ => return Err(SourceError::Shape),
    },
    _ => return Err(SourceError::Shape),
  };

  let mut reviews = Vec::with_capacity(items.len());
  for (index, item) in items.iter().enumerate() {
    match parse_raw_review(item) {
      Ok(raw) => reviews.push(raw),
      Err(e) => tracing::warn!(place_id, index, error = %e, "dropping malformed review item"),
    }
  }
  Ok(reviews)
}

impl ReviewSource for HttpReviewSource {
  type Error = SourceError;

  async fn fetch(&self, place_id: &str, limit: usize) -> Result<Vec<RawReview>, SourceError> {
    let url = self.reviews_url(place_id, limit)?;
    let mut req = self.client.get(url);
    if let Some(key) = &self.api_key {
      req = req.bearer_auth(key);
    }

    let body: Value = req.send().await?.error_for_status()?.json().await?;
    let mut reviews = extract_items(place_id, body)?;
    reviews.truncate(limit);
    Ok(reviews)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn source(base_url: &str) -> HttpReviewSource {
    HttpReviewSource::new(&SourceConfig {
      base_url:     base_url.into(),
      api_key:      None,
      fetch_limit:  50,
      timeout_secs: 20,
    })
    .unwrap()
  }

  #[test]
  fn reviews_url_appends_segments_and_limit() {
    let s = source("https://reviews.example.com/v1/");
    let url = s.reviews_url("ChIJ a/b", 25).unwrap();
    assert_eq!(
      url.as_str(),
      "https://reviews.example.com/v1/places/ChIJ%20a%2Fb/reviews?limit=25"
    );
  }

  #[test]
  fn non_base_url_is_rejected() {
    let err = HttpReviewSource::new(&SourceConfig {
      base_url:     "mailto:ops@example.com".into(),
      api_key:      None,
      fetch_limit:  50,
      timeout_secs: 20,
    });
    assert!(matches!(err, Err(SourceError::Url(_))));
  }

  #[test]
  fn bare_arrays_and_wrapped_arrays_are_both_accepted() {
    let item = json!({ "id": "r1", "rating": 2, "text": "bad" });

    let bare = extract_items("p", json!([item.clone()])).unwrap();
    assert_eq!(bare.len(), 1);
    assert_eq!(bare[0].external_review_id, "r1");

    let wrapped = extract_items("p", json!({ "reviews": [item], "next": null })).unwrap();
    assert_eq!(wrapped.len(), 1);
  }

  #[test]
  fn malformed_items_are_dropped() {
    let body = json!([
      { "id": "r1", "rating": 5 },
      { "rating": 5 },
      { "id": "r3", "rating": "five" },
    ]);
    let items = extract_items("p", body).unwrap();
    assert_eq!(items.len(), 1);
  }

  #[test]
  fn other_shapes_are_errors() {
    assert!(matches!(extract_items("p", json!({ "data": [] })), Err(SourceError::Shape)));
    assert!(matches!(extract_items("p", json!("nope")), Err(SourceError::Shape)));
  }
}
