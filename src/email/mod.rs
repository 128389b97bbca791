pub mod templates;

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::TokenPurpose;

/// SMTP delivery for token emails.
pub struct SystemMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SystemMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("System SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }

    /// Mail the link for `purpose` to `to_email`.
    pub async fn send_token(
        &self,
        to_email: &str,
        purpose: TokenPurpose,
        action_url: &str,
        ttl_minutes: i64,
    ) -> Result<(), String> {
        let (subject, html) = match purpose {
            TokenPurpose::VerifyEmail => (
                "Verify your email",
                templates::render_verify_email(action_url, ttl_minutes),
            ),
            TokenPurpose::ResetPassword => (
                "Password Reset",
                templates::render_password_reset(action_url, ttl_minutes),
            ),
        };

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        tracing::debug!(?purpose, "Token email sent");
        Ok(())
    }
}
