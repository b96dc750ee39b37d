use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use smartcrop_core::config::NotificationsConfig;
use thiserror::Error;
use tracing::{info, warn};

pub const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
pub const WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v17.0";

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("http client could not be built: {0}")]
    Client(reqwest::Error),
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("provider response carried no message id")]
    MissingMessageId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Sms,
    Whatsapp,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Live,
    Mock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// Outcome of one send attempt on one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: ChannelKind,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub mode: DeliveryMode,
    pub sent_at: DateTime<Utc>,
}

impl ChannelReport {
    pub fn is_sent(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    fn mode(&self) -> DeliveryMode;

    /// Delivers `message` to `phone` and returns the provider's message id.
    async fn send(&self, phone: &str, message: &str) -> Result<String, ChannelError>;
}

/// Logs the message instead of sending it.
#[derive(Clone, Copy, Debug)]
pub struct MockChannel {
    kind: ChannelKind,
}

impl MockChannel {
    pub fn sms() -> Self {
        Self { kind: ChannelKind::Sms }
    }

    pub fn whatsapp() -> Self {
        Self { kind: ChannelKind::Whatsapp }
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Mock
    }

    async fn send(&self, phone: &str, message: &str) -> Result<String, ChannelError> {
        let prefix = match self.kind {
            ChannelKind::Sms => "mock_sms",
            ChannelKind::Whatsapp => "mock_wa",
        };
        let message_id = format!("{prefix}_{}", Utc::now().format("%Y%m%d%H%M%S"));
        info!(
            event_name = "notify.mock.delivered",
            channel = %self.kind,
            phone,
            message_id = %message_id,
            body = message,
            "mock channel accepted message"
        );
        Ok(message_id)
    }
}

pub struct TwilioSmsChannel {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
}

impl TwilioSmsChannel {
    pub fn new(
        client: reqwest::Client,
        account_sid: String,
        auth_token: SecretString,
        from_number: String,
    ) -> Self {
        Self { client, base_url: TWILIO_API_BASE.to_string(), account_sid, auth_token, from_number }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for TwilioSmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Live
    }

    async fn send(&self, phone: &str, message: &str) -> Result<String, ChannelError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        );
        let form = [("From", self.from_number.as_str()), ("To", phone), ("Body", message)];

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected { status: status.as_u16(), body });
        }

        let body: TwilioMessage = response.json().await?;
        body.sid.ok_or(ChannelError::MissingMessageId)
    }
}

pub struct WhatsAppChannel {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    phone_number_id: String,
}

#[derive(Deserialize)]
struct WhatsAppResponse {
    #[serde(default)]
    messages: Vec<WhatsAppMessage>,
}

#[derive(Deserialize)]
struct WhatsAppMessage {
    id: String,
}

impl WhatsAppChannel {
    pub fn new(client: reqwest::Client, token: SecretString, phone_number_id: String) -> Self {
        Self { client, base_url: WHATSAPP_API_BASE.to_string(), token, phone_number_id }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Whatsapp
    }

    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Live
    }

    async fn send(&self, phone: &str, message: &str) -> Result<String, ChannelError> {
        let url =
            format!("{}/{}/messages", self.base_url.trim_end_matches('/'), self.phone_number_id);
        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": phone,
            "type": "text",
            "text": { "body": message },
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected { status: status.as_u16(), body });
        }

        let body: WhatsAppResponse = response.json().await?;
        body.messages
            .into_iter()
            .next()
            .map(|message| message.id)
            .ok_or(ChannelError::MissingMessageId)
    }
}

/// Fans one message out to every channel. Each channel gets exactly one attempt; a failed
/// channel is reported and never retried.
#[derive(Clone)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn mock() -> Self {
        Self::new(vec![Arc::new(MockChannel::sms()), Arc::new(MockChannel::whatsapp())])
    }

    /// Picks a live channel where credentials are complete and the mock otherwise.
    pub fn from_config(config: &NotificationsConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ChannelError::Client)?;

        let sms: Arc<dyn NotificationChannel> = match (
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_from_number,
        ) {
            (Some(sid), Some(token), Some(from)) => Arc::new(TwilioSmsChannel::new(
                client.clone(),
                sid.clone(),
                token.clone(),
                from.clone(),
            )),
            _ => Arc::new(MockChannel::sms()),
        };

        let whatsapp: Arc<dyn NotificationChannel> =
            match (&config.whatsapp_token, &config.whatsapp_phone_number_id) {
                (Some(token), Some(phone_number_id)) => Arc::new(WhatsAppChannel::new(
                    client,
                    token.clone(),
                    phone_number_id.clone(),
                )),
                _ => Arc::new(MockChannel::whatsapp()),
            };

        Ok(Self::new(vec![sms, whatsapp]))
    }

    pub fn modes(&self) -> Vec<(ChannelKind, DeliveryMode)> {
        self.channels.iter().map(|channel| (channel.kind(), channel.mode())).collect()
    }

    pub async fn dispatch(&self, phone: &str, message: &str) -> Vec<ChannelReport> {
        let mut reports = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let outcome = channel.send(phone, message).await;
            let sent_at = Utc::now();
            let report = match outcome {
                Ok(message_id) => ChannelReport {
                    channel: channel.kind(),
                    status: DeliveryStatus::Sent,
                    message_id: Some(message_id),
                    error: None,
                    mode: channel.mode(),
                    sent_at,
                },
                Err(error) => {
                    warn!(
                        event_name = "notify.channel.failed",
                        channel = %channel.kind(),
                        error = %error,
                        "notification channel failed; continuing with remaining channels"
                    );
                    ChannelReport {
                        channel: channel.kind(),
                        status: DeliveryStatus::Failed,
                        message_id: None,
                        error: Some(error.to_string()),
                        mode: channel.mode(),
                        sent_at,
                    }
                }
            };
            reports.push(report);
        }

        reports
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::mock()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("channels", &self.modes()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use smartcrop_core::config::AppConfig;

    use super::{
        ChannelError, ChannelKind, DeliveryMode, DeliveryStatus, MockChannel,
        NotificationChannel, Notifier, TwilioSmsChannel,
    };

    struct RejectingChannel;

    #[async_trait]
    impl NotificationChannel for RejectingChannel {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Sms
        }

        fn mode(&self) -> DeliveryMode {
            DeliveryMode::Live
        }

        async fn send(&self, _phone: &str, _message: &str) -> Result<String, ChannelError> {
            Err(ChannelError::Rejected { status: 401, body: "bad credentials".to_string() })
        }
    }

    #[tokio::test]
    async fn mock_notifier_reports_both_channels_sent() {
        let reports = Notifier::mock().dispatch("+919800000001", "hello").await;

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|report| report.is_sent()));
        assert!(reports.iter().all(|report| report.mode == DeliveryMode::Mock));
        assert!(reports[0].message_id.as_deref().is_some_and(|id| id.starts_with("mock_sms_")));
        assert!(reports[1].message_id.as_deref().is_some_and(|id| id.starts_with("mock_wa_")));
    }

    #[tokio::test]
    async fn failed_channel_does_not_stop_the_others() {
        let notifier =
            Notifier::new(vec![Arc::new(RejectingChannel), Arc::new(MockChannel::whatsapp())]);

        let reports = notifier.dispatch("+919800000001", "hello").await;

        assert_eq!(reports[0].status, DeliveryStatus::Failed);
        assert!(reports[0].error.as_deref().is_some_and(|error| error.contains("401")));
        assert_eq!(reports[0].message_id, None);
        assert_eq!(reports[1].status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn unreachable_twilio_endpoint_is_reported_as_failed() {
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(2)).build().expect("client");
        let channel = TwilioSmsChannel::new(
            client,
            "AC123".to_string(),
            "token".to_string().into(),
            "+15550000000".to_string(),
        )
        .with_base_url("http://127.0.0.1:9");

        let reports = Notifier::new(vec![Arc::new(channel)]).dispatch("+911", "hi").await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, DeliveryStatus::Failed);
        assert_eq!(reports[0].mode, DeliveryMode::Live);
    }

    #[test]
    fn config_without_credentials_selects_mock_channels() {
        let config = AppConfig::default();
        let notifier = Notifier::from_config(&config.notifications).expect("notifier");

        assert_eq!(
            notifier.modes(),
            vec![
                (ChannelKind::Sms, DeliveryMode::Mock),
                (ChannelKind::Whatsapp, DeliveryMode::Mock),
            ]
        );
    }

    #[test]
    fn complete_twilio_credentials_select_live_sms() {
        let mut config = AppConfig::default().notifications;
        config.twilio_account_sid = Some("AC123".to_string());
        config.twilio_auth_token = Some("secret".to_string().into());
        config.twilio_from_number = Some("+15550000000".to_string());

        let notifier = Notifier::from_config(&config).expect("notifier");

        assert_eq!(notifier.modes()[0], (ChannelKind::Sms, DeliveryMode::Live));
        assert_eq!(notifier.modes()[1], (ChannelKind::Whatsapp, DeliveryMode::Mock));
    }
}
