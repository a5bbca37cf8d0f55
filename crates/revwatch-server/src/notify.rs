//! Outbound notifiers: an HTTP mail relay, or a log line when none is set.

use std::time::Duration;

use reqwest::Client;
use revwatch_core::notify::{Notification, Notifier, SendOutcome};
use serde::Serialize;
use thiserror::Error;

use crate::config::NotifierConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("relay request failed: {0}")]
  Http(#[from] reqwest::Error),
}

/// JSON body posted to the relay.
#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
  from:    &'a str,
  to:      &'a str,
  subject: &'a str,
  text:    &'a str,
}

pub struct RelayNotifier {
  client:    Client,
  url:       String,
  api_token: Option<String>,
  from:      String,
}

impl RelayNotifier {
  pub fn new(
    url: String,
    api_token: Option<String>,
    from: String,
  ) -> Result<Self, NotifyError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, url, api_token, from })
  }
}

impl Notifier for RelayNotifier {
  type Error = NotifyError;

  async fn send(&self, message: &Notification) -> Result<SendOutcome, NotifyError> {
    let Some(to) = message.to.as_deref() else {
      return Ok(SendOutcome::Skipped);
    };

    let body = RelayMessage {
      from: &self.from,
      to,
      subject: &message.subject,
      text: &message.body,
    };
    let mut req = self.client.post(&self.url).json(&body);
    if let Some(token) = &self.api_token {
      req = req.bearer_auth(token);
    }
    req.send().await?.error_for_status()?;
    Ok(SendOutcome::Sent)
  }
}

/// Logs each alert and reports it skipped.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = NotifyError;

  async fn send(&self, message: &Notification) -> Result<SendOutcome, NotifyError> {
    tracing::info!(
      has_recipient = message.to.is_some(),
      subject = %message.subject,
      "alert not delivered: no relay configured"
    );
    if let Some(to) = &message.to {
      tracing::debug!(to = %to, "undelivered alert recipient");
    }
    Ok(SendOutcome::Skipped)
  }
}

/// The notifier selected by configuration.
pub enum ConfiguredNotifier {
  Relay(RelayNotifier),
  Log(LogNotifier),
}

impl ConfiguredNotifier {
  pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
    match &config.relay_url {
      Some(url) => Ok(Self::Relay(RelayNotifier::new(
        url.clone(),
        config.api_token.clone(),
        config.from.clone(),
      )?)),
      None => Ok(Self::Log(LogNotifier)),
    }
  }
}

impl Notifier for ConfiguredNotifier {
  type Error = NotifyError;

  async fn send(&self, message: &Notification) -> Result<SendOutcome, NotifyError> {
    match self {
      Self::Relay(n) => n.send(message).await,
      Self::Log(n) => n.send(message).await,
    }
  }
}
