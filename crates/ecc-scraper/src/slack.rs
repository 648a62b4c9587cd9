//! The operations channel: Slack when configured, the log otherwise.

use std::time::Duration;

use ecc_core::collab::Notifier;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::Result;

const POST_MESSAGE: &str = "https://slack.com/api/chat.postMessage";

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
  /// Bot token (`xoxb-...`).
  pub token:   String,
  pub channel: String,
}

/// Posts each line to one Slack channel.
pub struct SlackNotifier {
  client: Client,
  config: SlackConfig,
}

/// The subset of a Web API answer we look at. Slack reports most failures
/// with HTTP 200 and `ok: false`.
#[derive(Deserialize)]
struct ApiAnswer {
  ok:    bool,
  error: Option<String>,
}

impl SlackNotifier {
  pub fn new(config: SlackConfig, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, config })
  }

  fn message(&self, text: &str) -> Value { json!({ "channel": self.config.channel, "text": text }) }

  async fn post(&self, text: &str) -> std::result::Result<(), String> {
    let resp = self
      .client
      .post(POST_MESSAGE)
      .bearer_auth(&self.config.token)
      .json(&self.message(text))
      .send()
      .await
      .map_err(|e| e.to_string())?;

    let status = resp.status();
    if !status.is_success() {
      return Err(format!("HTTP {status}"));
    }
    let answer: ApiAnswer = resp.json().await.map_err(|e| e.to_string())?;
    if answer.ok {
      Ok(())
    } else {
      Err(answer.error.unwrap_or_else(|| "unknown error".into()))
    }
  }
}

impl Notifier for SlackNotifier {
  async fn send(&self, text: &str) {
    if let Err(reason) = self.post(text).await {
      warn!(%reason, channel = %self.config.channel, "slack notification failed");
    }
  }
}

/// Where status lines go.
pub enum OpsChannel {
  Slack(SlackNotifier),
  /// No channel configured; lines only reach the log.
  Log,
}

impl OpsChannel {
  pub fn from_config(slack: Option<SlackConfig>, timeout: Duration) -> Result<Self> {
    match slack {
      Some(config) if !config.token.is_empty() => {
        Ok(Self::Slack(SlackNotifier::new(config, timeout)?))
      }
      _ => Ok(Self::Log),
    }
  }
}

impl Notifier for OpsChannel {
  async fn send(&self, text: &str) {
    match self {
      Self::Slack(slack) => slack.send(text).await,
      Self::Log => debug!(text, "notification (no channel configured)"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(token: &str) -> SlackConfig {
    SlackConfig { token: token.into(), channel: "#ev-data".into() }
  }

  #[test]
  fn message_targets_the_configured_channel() {
    let slack = SlackNotifier::new(config("xoxb-1"), Duration::from_secs(5)).unwrap();
    assert_eq!(
      slack.message("SE - sweden updated with data from 2024-05!"),
      json!({ "channel": "#ev-data", "text": "SE - sweden updated with data from 2024-05!" })
    );
  }

  #[test]
  fn missing_or_blank_token_falls_back_to_the_log() {
    let timeout = Duration::from_secs(5);
    assert!(matches!(OpsChannel::from_config(None, timeout).unwrap(), OpsChannel::Log));
    assert!(matches!(OpsChannel::from_config(Some(config("")), timeout).unwrap(), OpsChannel::Log));
    assert!(matches!(
      OpsChannel::from_config(Some(config("xoxb-1")), timeout).unwrap(),
      OpsChannel::Slack(_)
    ));
  }

  #[tokio::test]
  async fn log_channel_never_fails() {
    OpsChannel::Log.send("FI - successfully retrieved data for 2024-05...").await;
  }
}
