//! Postmark API client for transactional email.
//!
//! Sends single messages through `POST /email`, authenticated with the
//! server token in the `X-Postmark-Server-Token` header.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use storynest_core::Email;

use super::email::{DeliveryError, EmailSender};
use crate::config::EmailConfig;

/// Postmark authentication header.
const TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// Outgoing message body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

/// Postmark response body (success and error share the shape).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiResponse {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
    #[serde(rename = "MessageID", default)]
    message_id: Option<String>,
}

/// Postmark API client.
#[derive(Clone)]
pub struct PostmarkClient {
    client: reqwest::Client,
    endpoint: Url,
    from_address: Email,
    message_stream: String,
}

impl PostmarkClient {
    /// Create a new Postmark client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value, the endpoint
    /// URL cannot be built, or the HTTP client fails to build.
    pub fn new(config: &EmailConfig) -> Result<Self, DeliveryError> {
        let mut headers = HeaderMap::new();

        let mut token = HeaderValue::from_str(config.server_token.expose_secret())
            .map_err(|e| DeliveryError::Config(format!("Invalid server token format: {e}")))?;
        token.set_sensitive(true);
        headers.insert(TOKEN_HEADER, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let endpoint = config
            .api_url
            .join("email")
            .map_err(|e| DeliveryError::Config(format!("Invalid API URL: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            from_address: config.from_address.clone(),
            message_stream: config.message_stream.clone(),
        })
    }

    /// Endpoint messages are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl EmailSender for PostmarkClient {
    #[instrument(skip_all, fields(to = %to.redacted(), stream = %self.message_stream))]
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), DeliveryError> {
        let body = OutgoingMessage {
            from: self.from_address.as_str(),
            to: to.as_str(),
            subject,
            html_body,
            text_body,
            message_stream: &self.message_stream,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ApiResponse>(&raw).ok();

        match parsed {
            Some(api) if status.is_success() && api.error_code == 0 => {
                tracing::info!(message_id = ?api.message_id, "Email accepted by Postmark");
                Ok(())
            }
            Some(api) => Err(DeliveryError::Provider {
                status: status.as_u16(),
                error_code: api.error_code,
                message: api.message,
            }),
            None if status.is_success() => {
                tracing::warn!("Postmark accepted email with an unreadable response body");
                Ok(())
            }
            None => Err(DeliveryError::Provider {
                status: status.as_u16(),
                error_code: -1,
                message: raw,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "postmark"
    }
}
