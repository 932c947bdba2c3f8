use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::warn;

use redress_core::config::NotifyConfig;
use redress_core::workflow::NotifyError;

use crate::dispatch::NotifyTransport;
use crate::message::RenderedMessage;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Posts rendered notifications into a support channel via
/// `chat.postMessage`. Slack reports API failures in the `ok` field of a
/// 200 response, so both layers are checked.
pub struct SlackTransport {
    client: Client,
    bot_token: SecretString,
    channel: String,
}

impl SlackTransport {
    pub fn new(
        bot_token: SecretString,
        channel: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| NotifyError::Delivery(format!("http client build failed: {error}")))?;

        Ok(Self { client, bot_token, channel: channel.into() })
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let bot_token = config.slack_bot_token.clone().ok_or_else(|| {
            NotifyError::Delivery("notify.slack_bot_token is not configured".to_string())
        })?;
        let channel = config.slack_channel.clone().ok_or_else(|| {
            NotifyError::Delivery("notify.slack_channel is not configured".to_string())
        })?;
        Self::new(bot_token, channel, Duration::from_secs(config.timeout_secs))
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[async_trait]
impl NotifyTransport for SlackTransport {
    async fn deliver(
        &self,
        recipient: &str,
        message: &RenderedMessage,
    ) -> Result<(), NotifyError> {
        let text = format!("*{}*\n{}\n_contact: {}_", message.subject, message.body, recipient);

        let response = self
            .client
            .post(POST_MESSAGE_URL)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&serde_json::json!({ "channel": self.channel, "text": text }))
            .send()
            .await
            .map_err(|error| NotifyError::Delivery(format!("slack request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Delivery(format!("slack returned http {status}")));
        }

        let body: PostMessageResponse = response.json().await.map_err(|error| {
            NotifyError::Delivery(format!("failed to decode slack response: {error}"))
        })?;

        if !body.ok {
            let reason = body.error.unwrap_or_else(|| "unknown_error".to_string());
            warn!(
                event_name = "notify.slack_rejected",
                reason = %reason,
                "slack rejected the message"
            );
            return Err(NotifyError::Delivery(format!("slack api error: {reason}")));
        }

        Ok(())
    }
}
