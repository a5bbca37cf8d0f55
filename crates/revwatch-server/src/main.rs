//! revwatch server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `REVWATCH_`
//! environment overrides, opens the SQLite store, and serves the trigger API.
//!
//! # Secret hash generation
//!
//! To generate an argon2 PHC string for `auth_password_hash` or
//! `cron_secret_hash`:
//!
//! ```text
//! cargo run -p revwatch-server --bin server -- --hash-secret
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use revwatch_api::{AppState, AuthConfig};
use revwatch_engine::Runner;
use revwatch_server::{
  config, notify::ConfiguredNotifier, source::HttpReviewSource,
};
use revwatch_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "revwatch review ingestion and alerting server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a secret entered on stdin and exit.
  #[arg(long)]
  hash_secret: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_secret {
    let secret = read_secret()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(secret.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = config::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let source =
    HttpReviewSource::new(&server_cfg.source).context("failed to build review connector")?;
  let notifier = ConfiguredNotifier::from_config(&server_cfg.notifier)
    .context("failed to build notifier")?;
  if matches!(notifier, ConfiguredNotifier::Log(_)) {
    tracing::warn!("no notifier.relay_url configured; alerts will only be logged");
  }
  if server_cfg.cron_secret_hash.is_none() {
    tracing::warn!("no cron_secret_hash configured; /api/cron/runs is open");
  }

  let runner = Runner::new(store, source, notifier, server_cfg.engine_config());
  let state = AppState {
    runner: Arc::new(runner),
    auth:   Arc::new(AuthConfig {
      username:         server_cfg.auth_username.clone(),
      password_hash:    server_cfg.auth_password_hash.clone(),
      cron_secret_hash: server_cfg.cron_secret_hash.clone(),
    }),
  };

  let app = revwatch_api::router(state);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Read a secret from stdin.
fn read_secret() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Secret: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
