//! Email delivery seam and verification email rendering.
//!
//! Verification emails are rendered from Askama templates (HTML + plain text)
//! and handed to an [`EmailSender`]. Production uses
//! [`PostmarkClient`](super::PostmarkClient); without provider credentials the
//! server falls back to [`LogSender`], which only logs the message.

use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use storynest_core::{Email, VerificationCode};

/// Subject line of the verification email.
pub const VERIFICATION_SUBJECT: &str = "Your Storynest verification code";

/// HTML template for verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeEmailHtml<'a> {
    code: &'a str,
    valid_minutes: i64,
}

/// Plain text template for verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeEmailText<'a> {
    code: &'a str,
    valid_minutes: i64,
}

/// Errors that can occur when delivering email.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// HTTP request to the provider failed (connect, TLS, body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with an error.
    #[error("provider error: {status} (code {error_code}) - {message}")]
    Provider {
        status: u16,
        error_code: i64,
        message: String,
    },

    /// Provider did not answer in time.
    #[error("email provider timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Sender could not be configured.
    #[error("email sender misconfigured: {0}")]
    Config(String),
}

impl DeliveryError {
    /// Provider-specific detail for diagnostics.
    #[must_use]
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::Http(e) => json!({
                "kind": "http",
                "timeout": e.is_timeout(),
                "connect": e.is_connect(),
                "status": e.status().map(|s| s.as_u16()),
            }),
            Self::Provider {
                status,
                error_code,
                message,
            } => json!({
                "kind": "provider",
                "status": status,
                "errorCode": error_code,
                "message": message,
            }),
            Self::Timeout(after) => json!({
                "kind": "timeout",
                "afterSeconds": after.as_secs(),
            }),
            Self::Template(_) => json!({ "kind": "template" }),
            Self::Config(_) => json!({ "kind": "config" }),
        }
    }
}

/// Sends one transactional email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message with both HTML and plain-text bodies.
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), DeliveryError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Development sender: logs the message instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        _html_body: &str,
        text_body: &str,
    ) -> Result<(), DeliveryError> {
        tracing::warn!(
            to = %to,
            subject = %subject,
            body = %text_body,
            "Email provider not configured - message logged (dev mode)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// A rendered email ready for an [`EmailSender`].
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: &'static str,
    pub html: String,
    pub text: String,
}

/// Render the verification email for `code`.
///
/// `valid_minutes` is the validity promised in the copy.
///
/// # Errors
///
/// Returns error if a template fails to render.
pub fn render_verification_email(
    code: &VerificationCode,
    valid_minutes: i64,
) -> Result<RenderedEmail, DeliveryError> {
    let code = code.as_str();
    let html = VerificationCodeEmailHtml {
        code,
        valid_minutes,
    }
    .render()?;
    let text = VerificationCodeEmailText {
        code,
        valid_minutes,
    }
    .render()?;

    Ok(RenderedEmail {
        subject: VERIFICATION_SUBJECT,
        html,
        text,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_verification_email() {
        let code = VerificationCode::parse("482913").unwrap();
        let email = render_verification_email(&code, 10).unwrap();

        assert_eq!(email.subject, VERIFICATION_SUBJECT);
        assert!(email.html.contains("482913"));
        assert!(email.text.contains("482913"));
        assert!(email.html.contains("10 minutes"));
        assert!(email.text.contains("10 minutes"));
    }

    #[test]
    fn test_provider_error_details() {
        let err = DeliveryError::Provider {
            status: 422,
            error_code: 300,
            message: "Invalid 'To' address".to_string(),
        };
        let details = err.details();
        assert_eq!(details["kind"], "provider");
        assert_eq!(details["errorCode"], 300);
        assert_eq!(details["status"], 422);
        assert!(err.to_string().contains("Invalid 'To' address"));
    }

    #[test]
    fn test_timeout_details() {
        let err = DeliveryError::Timeout(Duration::from_secs(5));
        assert_eq!(err.details()["afterSeconds"], 5);
        assert_eq!(err.to_string(), "email provider timed out after 5s");
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let to = Email::parse("parent@example.com").unwrap();
        assert!(LogSender.send(&to, "s", "<p>h</p>", "t").await.is_ok());
        assert_eq!(LogSender.name(), "log");
    }
}
