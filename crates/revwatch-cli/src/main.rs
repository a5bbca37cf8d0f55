//! `revwatch`: operator CLI for the revwatch trigger API.
//!
//! # Usage
//!
//! ```text
//! revwatch run <tenant>
//! revwatch cron [--tenant <id>] [--secret <s>]
//! revwatch backfill <tenant> <place> reviews.json
//! ```
//!
//! Connection settings come from `~/.config/revwatch/cli.toml` unless
//! overridden with flags or `REVWATCH_*` environment variables.

mod client;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "revwatch", about = "Trigger revwatch ingestion runs")]
struct Args {
  /// Path to a TOML config file (base_url, username, password, cron_secret).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the revwatch server.
  #[arg(long, env = "REVWATCH_URL")]
  url: Option<String>,

  /// Operator username.
  #[arg(long, env = "REVWATCH_USER")]
  user: Option<String>,

  /// Operator password (plaintext).
  #[arg(long, env = "REVWATCH_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Ingest one tenant and evaluate its alerts.
  Run { tenant: Uuid },

  /// Fire the scheduled trigger for one tenant or all of them.
  Cron {
    #[arg(long)]
    tenant: Option<Uuid>,

    /// Cron bearer secret.
    #[arg(long, env = "REVWATCH_CRON_SECRET")]
    secret: Option<String>,
  },

  /// Merge reviews from a JSON file into one place.
  Backfill {
    tenant: Uuid,
    place:  String,
    /// A JSON array of reviews, or an object with a `reviews` array.
    file:   PathBuf,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  base_url:    String,
  #[serde(default)]
  username:    String,
  #[serde(default)]
  password:    String,
  #[serde(default)]
  cron_secret: Option<String>,
}

fn default_config_path() -> Option<PathBuf> {
  std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/revwatch/cli.toml"))
}

/// An explicit path must exist; the default one may be absent.
fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile> {
  let path = match explicit {
    Some(p) => p.to_path_buf(),
    None => match default_config_path() {
      Some(p) if p.exists() => p,
      _ => return Ok(ConfigFile::default()),
    },
  };
  let raw = std::fs::read_to_string(&path)
    .with_context(|| format!("reading config file {}", path.display()))?;
  toml::from_str(&raw).context("parsing config file")
}

fn non_empty(s: String) -> Option<String> { (!s.is_empty()).then_some(s) }

/// Flags override the config file, which overrides defaults.
fn resolve(
  url: Option<String>,
  user: Option<String>,
  password: Option<String>,
  file: ConfigFile,
) -> ApiConfig {
  ApiConfig {
    base_url:    url
      .or_else(|| non_empty(file.base_url))
      .unwrap_or_else(|| DEFAULT_URL.to_string()),
    username:    user.or_else(|| non_empty(file.username)).unwrap_or_default(),
    password:    password.or_else(|| non_empty(file.password)).unwrap_or_default(),
    cron_secret: file.cron_secret.and_then(non_empty),
  }
}

fn read_backfill_file(path: &Path) -> Result<Vec<Value>> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading {}", path.display()))?;
  parse_backfill(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn parse_backfill(raw: &str) -> Result<Vec<Value>> {
  match serde_json::from_str::<Value>(raw)? {
    Value::Array(items) => Ok(items),
    Value::Object(mut obj) => match obj.remove("reviews") {
      Some(Value::Array(items)) => Ok(items),
      _ => bail!("expected a `reviews` array"),
    },
    _ => bail!("expected a JSON array or an object with `reviews`"),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let file_cfg = load_config_file(args.config.as_deref())?;
  let mut api_config = resolve(args.url, args.user, args.password, file_cfg);

  let output = match args.command {
    Command::Run { tenant } => ApiClient::new(api_config)?.run_tenant(tenant).await?,
    Command::Cron { tenant, secret } => {
      if secret.is_some() {
        api_config.cron_secret = secret;
      }
      ApiClient::new(api_config)?.cron(tenant).await?
    }
    Command::Backfill { tenant, place, file } => {
      let reviews = read_backfill_file(&file)?;
      ApiClient::new(api_config)?.backfill(tenant, &place, reviews).await?
    }
  };

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}
