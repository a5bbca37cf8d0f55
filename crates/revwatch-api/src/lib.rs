//! JSON trigger API for revwatch.
//!
//! Exposes an axum [`Router`] over a [`Runner`] built from any store, source
//! and notifier. TLS and process concerns are the caller's responsibility.

pub mod auth;
pub mod error;
pub mod runs;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use revwatch_core::{notify::Notifier, source::ReviewSource, store::ReviewStore};
use revwatch_engine::Runner;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, C, N> {
  pub runner: Arc<Runner<S, C, N>>,
  pub auth:   Arc<AuthConfig>,
}

impl<S, C, N> Clone for AppState<S, C, N> {
  fn clone(&self) -> Self {
    Self { runner: Arc::clone(&self.runner), auth: Arc::clone(&self.auth) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the trigger router.
pub fn router<S, C, N>(state: AppState<S, C, N>) -> Router
where
  S: ReviewStore + 'static,
  C: ReviewSource + 'static,
  N: Notifier + 'static,
{
  Router::new()
    .route("/healthz", get(healthz))
    .route("/api/tenants/{tenant_id}/runs", post(runs::tenant::<S, C, N>))
    .route("/api/cron/runs", post(runs::cron::<S, C, N>))
    .route(
      "/api/tenants/{tenant_id}/places/{place_id}/backfill",
      post(runs::backfill::<S, C, N>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn healthz() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests {
  use std::{convert::Infallible, future::Future};

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use rand_core::OsRng;
  use revwatch_core::{
    notify::{Notification, SendOutcome},
    place::Place,
    source::RawReview,
  };
  use revwatch_engine::EngineConfig;
  use revwatch_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  /// Every place returns the same single low review.
  struct OneReviewSource;

  impl ReviewSource for OneReviewSource {
    type Error = Infallible;

    fn fetch<'a>(
      &'a self,
      place_id: &'a str,
      _limit: usize,
    ) -> impl Future<Output = Result<Vec<RawReview>, Infallible>> + Send + 'a {
      async move {
        Ok(vec![RawReview {
          external_review_id:  format!("{place_id}-r1"),
          author_name:         None,
          rating:              2.0,
          comment:             Some("bad".into()),
          review_published_at: None,
          raw_payload:         json!({}),
        }])
      }
    }
  }

  struct SkipNotifier;

  impl Notifier for SkipNotifier {
    type Error = Infallible;

    fn send<'a>(
      &'a self,
      _message: &'a Notification,
    ) -> impl Future<Output = Result<SendOutcome, Infallible>> + Send + 'a {
      async { Ok(SendOutcome::Skipped) }
    }
  }

  type TestState = AppState<SqliteStore, OneReviewSource, SkipNotifier>;

  fn hash(secret: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(secret.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  async fn make_state(cron_secret: Option<&str>) -> (TestState, Uuid) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tenant = Uuid::new_v4();
    store
      .put_place(Place {
        tenant_id:    tenant,
        place_id:     "p".into(),
        display_name: "P".into(),
        is_active:    true,
      })
      .await
      .unwrap();

    let runner = Runner::new(store, OneReviewSource, SkipNotifier, EngineConfig::default());
    let state = AppState {
      runner: Arc::new(runner),
      auth:   Arc::new(AuthConfig {
        username:         "ops".into(),
        password_hash:    hash("hunter2"),
        cron_secret_hash: cron_secret.map(hash),
      }),
    };
    (state, tenant)
  }

  fn operator() -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Basic {}", B64.encode("ops:hunter2")))
  }

  async fn call(
    state: TestState,
    method: &str,
    uri: &str,
    headers: Vec<(header::HeaderName, String)>,
    body: Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    router(state).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn healthz_is_open() {
    let (state, _) = make_state(None).await;
    let res = call(state, "GET", "/healthz", vec![], None).await;
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn manual_run_requires_operator_credentials() {
    let (state, tenant) = make_state(None).await;
    let uri = format!("/api/tenants/{tenant}/runs");

    let res = call(state.clone(), "POST", &uri, vec![], None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let wrong = (header::AUTHORIZATION, format!("Basic {}", B64.encode("ops:nope")));
    let res = call(state, "POST", &uri, vec![wrong], None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn manual_run_returns_tenant_summary() {
    let (state, tenant) = make_state(None).await;
    let uri = format!("/api/tenants/{tenant}/runs");

    let res = call(state, "POST", &uri, vec![operator()], None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["tenant_id"], tenant.to_string());
    assert_eq!(body["places"], 1);
    assert_eq!(body["ingested"], 1);
    assert_eq!(body["critical_new"], 1);
    assert_eq!(body["alerts"]["sent"], 1);
  }

  #[tokio::test]
  async fn malformed_tenant_id_is_rejected() {
    let (state, _) = make_state(None).await;
    let res = call(state, "POST", "/api/tenants/not-a-uuid/runs", vec![operator()], None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn open_cron_runs_every_tenant() {
    let (state, tenant) = make_state(None).await;
    let res = call(state, "POST", "/api/cron/runs", vec![], None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["ingested"], 1);
    assert_eq!(body["tenants"][0]["tenant_id"], tenant.to_string());
  }

  #[tokio::test]
  async fn guarded_cron_checks_the_bearer_secret() {
    let (state, tenant) = make_state(Some("tick-tock")).await;

    let res = call(state.clone(), "POST", "/api/cron/runs", vec![], None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let bad = (header::AUTHORIZATION, "Bearer nope".to_string());
    let res = call(state.clone(), "POST", "/api/cron/runs", vec![bad], None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let good = (header::AUTHORIZATION, "Bearer tick-tock".to_string());
    let uri = format!("/api/cron/runs?tenant_id={tenant}");
    let res = call(state, "POST", &uri, vec![good], None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["tenants"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn backfill_reports_accepted_and_rejected_items() {
    let (state, tenant) = make_state(None).await;
    let uri = format!("/api/tenants/{tenant}/places/p/backfill");
    let body = json!({
      "reviews": [
        { "id": "b1", "rating": 1, "text": "cold" },
        { "id": "b2", "rating": "abc" },
        { "rating": 2 },
      ]
    });

    let res = call(state, "POST", &uri, vec![operator()], Some(body)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["ingested"], 1);
    assert_eq!(body["critical_new"], 1);
    assert_eq!(body["rejected"][0]["index"], 1);
    assert_eq!(body["rejected"][1]["index"], 2);
    assert_eq!(body["rejected"][1]["reason"], "missing external review id");
    assert_eq!(body["alerts"]["sent"], 1);
  }

  #[tokio::test]
  async fn backfill_requires_operator_credentials() {
    let (state, tenant) = make_state(None).await;
    let uri = format!("/api/tenants/{tenant}/places/p/backfill");
    let res = call(state, "POST", &uri, vec![], Some(json!({ "reviews": [] }))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  }
}
