use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::EmailConfig,
    error::{AppError, Result},
};

/// Delivers one-time signup codes.
#[async_trait]
pub trait EmailSender: Send + Sync {
    fn name(&self) -> &str;
    async fn send_otp(&self, to: &str, code: &str) -> Result<()>;
}

/// Picks the transport for the configured environment. Without an SMTP host
/// codes are only written to the log, which is what local development wants.
pub fn from_config(config: &EmailConfig) -> Result<Arc<dyn EmailSender>> {
    match (config.enabled, config.smtp_host.as_deref()) {
        (true, Some(host)) if !host.is_empty() => {
            Ok(Arc::new(SmtpEmailSender::new(config, host)?))
        }
        (true, _) => {
            tracing::warn!("Email enabled but no SMTP host configured; codes go to the debug log only");
            Ok(Arc::new(LogEmailSender))
        }
        (false, _) => {
            tracing::warn!("Email delivery disabled; verification codes go to the debug log only");
            Ok(Arc::new(LogEmailSender))
        }
    }
}

fn otp_body(code: &str) -> String {
    format!(
        "Your verification code is {code}.\n\n\
         It expires in a few minutes. If you did not request this code you can ignore this email.\n"
    )
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &EmailConfig, host: &str) -> Result<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Internal(format!("Invalid SMTP relay {}: {}", host, e)))?
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_otp(&self, to: &str, code: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid email address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Your verification code")
            .header(ContentType::TEXT_PLAIN)
            .body(otp_body(code))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::External(format!("SMTP delivery failed: {}", e)))?;

        Ok(())
    }
}

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_otp(&self, to: &str, code: &str) -> Result<()> {
        tracing::debug!("Verification code for {}: {}", to, code);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingEmailSender;

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use super::*;
    use tokio::sync::Mutex;

    /// Keeps every code it was asked to send; can be told to fail.
    #[derive(Default)]
    pub struct RecordingEmailSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingEmailSender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub async fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().await.clone()
        }

        pub async fn last_code_for(&self, email: &str) -> Option<String> {
            self.sent
                .lock()
                .await
                .iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, code)| code.clone())
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmailSender {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_otp(&self, to: &str, code: &str) -> Result<()> {
            if self.fail {
                return Err(AppError::External("mail relay unavailable".to_string()));
            }
            self.sent.lock().await.push((to.to_string(), code.to_string()));
            Ok(())
        }
    }
}
