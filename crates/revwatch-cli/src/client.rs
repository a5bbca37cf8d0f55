//! Async HTTP client wrapping the revwatch trigger API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use uuid::Uuid;

/// Connection settings for the revwatch API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
  pub base_url:    String,
  pub username:    String,
  pub password:    String,
  pub cron_secret: Option<String>,
}

/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(300))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn operator(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn read(what: &str, resp: Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(anyhow!("{what} → {status}: {body}"));
    }
    resp.json().await.with_context(|| format!("deserialising {what} response"))
  }

  /// `POST /api/tenants/{tenant_id}/runs`
  pub async fn run_tenant(&self, tenant_id: Uuid) -> Result<Value> {
    let what = format!("POST /tenants/{tenant_id}/runs");
    let resp = self
      .operator(self.client.post(self.url(&format!("/tenants/{tenant_id}/runs"))))
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    Self::read(&what, resp).await
  }

  /// `POST /api/cron/runs[?tenant_id=<id>]`
  pub async fn cron(&self, tenant_id: Option<Uuid>) -> Result<Value> {
    let mut req = self.client.post(self.url("/cron/runs"));
    if let Some(id) = tenant_id {
      req = req.query(&[("tenant_id", id.to_string())]);
    }
    if let Some(secret) = &self.config.cron_secret {
      req = req.bearer_auth(secret);
    }
    let resp = req.send().await.context("POST /cron/runs failed")?;
    Self::read("POST /cron/runs", resp).await
  }

  /// `POST /api/tenants/{tenant_id}/places/{place_id}/backfill`
  pub async fn backfill(
    &self,
    tenant_id: Uuid,
    place_id: &str,
    reviews: Vec<Value>,
  ) -> Result<Value> {
    let path = format!("/tenants/{tenant_id}/places/{place_id}/backfill");
    let what = format!("POST {path}");
    let resp = self
      .operator(self.client.post(self.url(&path)))
      .json(&json!({ "reviews": reviews }))
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    Self::read(&what, resp).await
  }
}
