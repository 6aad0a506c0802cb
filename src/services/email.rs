use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::error::{AppError, AppResult};

/// One outbound email, plain text with an optional HTML alternative.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Capability interface for the outbound email transport.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(&self, msg: &EmailMessage) -> AppResult<()>;
}

/// SMTP email sender (async lettre, STARTTLS relay).
pub struct SmtpEmail {
    config: EmailConfig,
}

impl SmtpEmail {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn from_mailbox(&self) -> AppResult<Mailbox> {
        let from = self
            .config
            .from_address
            .as_deref()
            .or(self.config.smtp_user.as_deref())
            .ok_or_else(|| {
                AppError::ServiceUnavailable("SMTP from address not configured".to_string())
            })?;

        from.parse()
            .map_err(|e| AppError::Email(format!("Invalid from address: {}", e)))
    }
}

#[async_trait]
impl EmailTransport for SmtpEmail {
    async fn send_email(&self, msg: &EmailMessage) -> AppResult<()> {
        let host = self.config.smtp_host.as_deref().ok_or_else(|| {
            AppError::ServiceUnavailable("SMTP configuration missing".to_string())
        })?;

        let to: Mailbox = msg
            .to
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid recipient address: {}", e)))?;

        let builder = Message::builder()
            .from(self.from_mailbox()?)
            .to(to)
            .subject(&msg.subject);

        let email = match &msg.html {
            Some(html) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(msg.text.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .map_err(|e| AppError::Email(format!("Failed to build email: {}", e)))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(msg.text.clone())
                .map_err(|e| AppError::Email(format!("Failed to build email: {}", e)))?,
        };

        let mut transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Email(format!("SMTP relay: {}", e)))?
            .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_pass) {
            transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport
            .build()
            .send(email)
            .await
            .map_err(|e| AppError::Email(format!("SMTP send: {}", e)))?;

        tracing::debug!("Email sent to {}", msg.to);
        Ok(())
    }
}
