//! Verification email delivery check.

use std::sync::Arc;

use tracing::info;

use storynest_core::{Email, VerificationCode};
use storynest_server::config::ServerConfig;
use storynest_server::services::{EmailSender, LogSender, PostmarkClient, render_verification_email};

/// Send a verification email to `to` through the configured provider.
///
/// Uses Postmark when `POSTMARK_SERVER_TOKEN` is set and logs the message
/// otherwise. No session is retained; this only exercises delivery.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the address or code is
/// malformed, or delivery fails or times out.
#[allow(clippy::print_stdout)]
pub async fn send_code(to: &str, code: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let to = Email::parse(to)?;
    let code = code.map_or_else(|| Ok(VerificationCode::generate()), VerificationCode::parse)?;

    let sender: Arc<dyn EmailSender> = match &config.email {
        Some(email) => Arc::new(PostmarkClient::new(email)?),
        None => Arc::new(LogSender),
    };

    let rendered = render_verification_email(&code, config.verification.valid_minutes())?;
    let timeout = config.verification.send_timeout;

    tokio::time::timeout(
        timeout,
        sender.send(&to, rendered.subject, &rendered.html, &rendered.text),
    )
    .await
    .map_err(|_| format!("email provider timed out after {}s", timeout.as_secs()))??;

    info!(to = %to.redacted(), sender = sender.name(), "Verification email sent");
    println!("{code}");
    Ok(())
}
