use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SmsConfig;
use crate::error::{AppError, AppResult};

/// One outbound text message.
#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub to: String,
    pub message: String,
}

/// Capability interface for the outbound SMS transport. The queue worker is
/// the only consumer; tests substitute fakes.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send_sms(&self, msg: &SmsMessage) -> AppResult<()>;
}

/// SMS gateway client speaking the Africa's Talking messaging API.
pub struct GatewaySms {
    http: reqwest::Client,
    config: SmsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GatewayResponse {
    #[serde(rename = "SMSMessageData")]
    sms_message_data: GatewayMessageData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GatewayMessageData {
    recipients: Vec<GatewayRecipient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayRecipient {
    status: String,
    number: String,
}

impl GatewaySms {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SmsTransport for GatewaySms {
    async fn send_sms(&self, msg: &SmsMessage) -> AppResult<()> {
        let (username, api_key) = match (&self.config.username, &self.config.api_key) {
            (Some(u), Some(k)) => (u.clone(), k.clone()),
            _ => {
                return Err(AppError::ServiceUnavailable(
                    "SMS gateway credentials not configured".to_string(),
                ))
            }
        };

        let mut form = vec![
            ("username", username),
            ("to", msg.to.clone()),
            ("message", msg.message.clone()),
        ];
        if let Some(ref from) = self.config.sender_id {
            form.push(("from", from.clone()));
        }

        let response = self
            .http
            .post(&self.config.api_url)
            .header("apiKey", api_key)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Sms(format!(
                "SMS gateway rejected request ({}): {}",
                status, body
            )));
        }

        // The gateway reports per-recipient outcomes inside a 2xx response.
        let parsed: GatewayResponse = response.json().await?;
        for recipient in &parsed.sms_message_data.recipients {
            if recipient.status != "Success" {
                return Err(AppError::Sms(format!(
                    "SMS to {} not accepted: {}",
                    recipient.number, recipient.status
                )));
            }
        }

        tracing::debug!("SMS accepted by gateway for {}", msg.to);
        Ok(())
    }
}
