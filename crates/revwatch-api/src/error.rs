//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use revwatch_engine::RunError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Run(#[from] RunError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"revwatch\""),
        );
        res
      }
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Run(e) => {
        tracing::error!(tenant_id = %e.tenant_id, stage = %e.stage, error = %e, "run failed");
        let body = json!({
          "error":     e.source.to_string(),
          "stage":     e.stage,
          "tenant_id": e.tenant_id,
          "place_id":  e.place_id,
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::body::to_bytes;
  use revwatch_engine::Stage;
  use uuid::Uuid;

  use super::*;

  #[tokio::test]
  async fn run_failure_names_stage_tenant_and_place() {
    let tenant = Uuid::new_v4();
    let err = RunError::new(tenant, Stage::Upsert, "database is locked").with_place("p-9");

    let res = ApiError::from(err).into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "database is locked");
    assert_eq!(body["stage"], "upsert");
    assert_eq!(body["tenant_id"], tenant.to_string());
    assert_eq!(body["place_id"], "p-9");
  }

  #[test]
  fn unauthorized_carries_challenge() {
    let res = ApiError::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
