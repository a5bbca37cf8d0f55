//! Trigger guards: operator Basic auth and the cron shared secret.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use revwatch_core::{notify::Notifier, source::ReviewSource, store::ReviewStore};

use crate::{AppState, error::ApiError};

/// Credentials accepted by this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:         String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash:    String,
  /// PHC hash of the cron bearer secret; `None` leaves the cron trigger open.
  pub cron_secret_hash: Option<String>,
}

/// Present in a handler means the caller passed operator Basic auth.
pub struct Operator;

/// Present in a handler means the caller may fire the scheduled trigger.
pub struct CronCaller;

fn verify_phc(secret: &str, phc: &str) -> Result<(), ApiError> {
  let parsed = PasswordHash::new(phc).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(secret.as_bytes(), &parsed)
    .map_err(|_| ApiError::Unauthorized)
}

fn authorization<'h>(headers: &'h HeaderMap, scheme: &str) -> Result<&'h str, ApiError> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix(scheme))
    .map(str::trim)
    .ok_or(ApiError::Unauthorized)
}

/// Check `Authorization: Basic …` against the operator credentials.
pub fn verify_basic(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  let encoded = authorization(headers, "Basic ")?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != config.username {
    return Err(ApiError::Unauthorized);
  }
  verify_phc(password, &config.password_hash)
}

/// Check `Authorization: Bearer <secret>` when a cron secret is configured.
pub fn verify_cron(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  match &config.cron_secret_hash {
    None => Ok(()),
    Some(phc) => verify_phc(authorization(headers, "Bearer ")?, phc),
  }
}

impl<S, C, N> FromRequestParts<AppState<S, C, N>> for Operator
where
  S: ReviewStore + 'static,
  C: ReviewSource + 'static,
  N: Notifier + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, C, N>,
  ) -> Result<Self, Self::Rejection> {
    verify_basic(&parts.headers, &state.auth)?;
    Ok(Operator)
  }
}

impl<S, C, N> FromRequestParts<AppState<S, C, N>> for CronCaller
where
  S: ReviewStore + 'static,
  C: ReviewSource + 'static,
  N: Notifier + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, C, N>,
  ) -> Result<Self, Self::Rejection> {
    verify_cron(&parts.headers, &state.auth)?;
    Ok(CronCaller)
  }
}
