//! Server configuration: a TOML file layered with `REVWATCH_` env vars.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `REVWATCH_SOURCE__BASE_URL` or `REVWATCH_NOTIFIER__API_TOKEN`.

use std::{path::PathBuf, time::Duration};

use chrono::TimeDelta;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use revwatch_engine::{EngineConfig, IngestConfig};
use serde::Deserialize;

// ─── Types ───────────────────────────────────────────────────────────────────

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  pub auth_username:       String,
  pub auth_password_hash:  String,
  /// Argon2 hash of the cron bearer secret. Absent: the cron trigger is open.
  #[serde(default)]
  pub cron_secret_hash:    Option<String>,
  #[serde(default = "default_claim_lease_minutes")]
  pub claim_lease_minutes: i64,
  pub source:              SourceConfig,
  #[serde(default)]
  pub notifier:            NotifierConfig,
}

/// The upstream review provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  pub base_url:     String,
  #[serde(default)]
  pub api_key:      Option<String>,
  #[serde(default = "default_fetch_limit")]
  pub fetch_limit:  usize,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

/// The outbound mail relay. Without `relay_url`, alerts are only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
  #[serde(default)]
  pub relay_url: Option<String>,
  #[serde(default)]
  pub api_token: Option<String>,
  #[serde(default = "default_from")]
  pub from:      String,
}

impl Default for NotifierConfig {
  fn default() -> Self {
    Self { relay_url: None, api_token: None, from: default_from() }
  }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("revwatch.db") }
fn default_claim_lease_minutes() -> i64 { 10 }
fn default_fetch_limit() -> usize { IngestConfig::DEFAULT_FETCH_LIMIT }
fn default_timeout_secs() -> u64 { IngestConfig::DEFAULT_FETCH_TIMEOUT.as_secs() }
fn default_from() -> String { "alerts@revwatch.local".into() }

// ─── Loading ─────────────────────────────────────────────────────────────────

fn environment() -> Environment {
  Environment::with_prefix("REVWATCH")
    .prefix_separator("_")
    .separator("__")
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<ServerConfig, ConfigError> {
  builder.build()?.try_deserialize()
}

/// Read `path` (optional) and the environment.
pub fn load(path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
  finish(
    Config::builder()
      .add_source(File::from(path.into()).required(false))
      .add_source(environment()),
  )
}

/// Parse a TOML document without consulting the environment.
pub fn from_toml(toml: &str) -> Result<ServerConfig, ConfigError> {
  finish(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      ingest:      IngestConfig {
        fetch_limit:   self.source.fetch_limit,
        fetch_timeout: Duration::from_secs(self.source.timeout_secs),
      },
      claim_lease: TimeDelta::try_minutes(self.claim_lease_minutes)
        .unwrap_or(revwatch_engine::alert::DEFAULT_CLAIM_LEASE),
    }
  }
}
