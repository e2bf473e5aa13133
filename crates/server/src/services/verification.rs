//! Email verification: issuing one-time codes and checking them.
//!
//! Flow:
//! 1. `issue` (or `issue_with_code` for browsers that pick their own code)
//!    renders the email, sends it through the configured [`EmailSender`] with
//!    a bounded timeout, and only then retains a pending session.
//! 2. `verify` compares the entered code with the retained one. A match marks
//!    the session verified and, when a profile id is given, the profile too.
//!
//! Sessions are kept in memory, keyed by normalised email. Issuing again for
//! the same address replaces the previous session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use moka::ops::compute::Op;
use thiserror::Error;
use tracing::{info, instrument, warn};

use storynest_core::{
    CodeError, Email, EmailError, ProfileId, VerificationCode, VerificationSession, VerifyOutcome,
};

use super::email::{DeliveryError, EmailSender, render_verification_email};
use crate::config::VerificationConfig;
use crate::db::{ProfileStore, StoreError};

/// Upper bound on retained sessions.
const MAX_SESSIONS: u64 = 10_000;

/// Abandoned sessions are dropped after this long without access.
const SESSION_IDLE: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors that can occur during verification.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Recipient address is missing or malformed.
    #[error("Invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Code is missing or malformed.
    #[error("Invalid verification code: {0}")]
    InvalidCode(#[from] CodeError),

    /// Profile id is missing or malformed.
    #[error("Invalid profile id: {0}")]
    InvalidProfileId(String),

    /// Email provider failed.
    #[error("Email delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// No code was issued for this address.
    #[error("No verification in progress for this email")]
    NoSession,

    /// Marking the profile verified failed.
    #[error("Profile update failed: {0}")]
    Store(#[from] StoreError),
}

impl VerificationError {
    /// Whether the caller can fix this by changing the request.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail(_)
                | Self::InvalidCode(_)
                | Self::InvalidProfileId(_)
                | Self::NoSession
                | Self::Store(StoreError::NotFound(_))
        )
    }
}

/// Issues and checks verification codes.
#[derive(Clone)]
pub struct VerificationService {
    sender: Arc<dyn EmailSender>,
    store: ProfileStore,
    sessions: Cache<Email, VerificationSession>,
    config: VerificationConfig,
}

impl VerificationService {
    /// Create a new verification service.
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>, store: ProfileStore, config: VerificationConfig) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(SESSION_IDLE)
            .build();

        Self {
            sender,
            store,
            sessions,
            config,
        }
    }

    /// Verification settings in effect.
    #[must_use]
    pub const fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Generate a code for `email`, send it, and retain the session.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::InvalidEmail` before contacting the
    /// provider, or `VerificationError::Delivery` if sending fails.
    #[instrument(skip_all)]
    pub async fn issue(&self, email: &str) -> Result<VerificationSession, VerificationError> {
        let email = Email::parse(email)?;
        self.dispatch(email, VerificationCode::generate()).await
    }

    /// Send a caller-chosen code to `email` and retain the session.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::InvalidEmail` or
    /// `VerificationError::InvalidCode` before contacting the provider, or
    /// `VerificationError::Delivery` if sending fails.
    #[instrument(skip_all)]
    pub async fn issue_with_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<VerificationSession, VerificationError> {
        let email = Email::parse(email)?;
        let code = VerificationCode::parse(code)?;
        self.dispatch(email, code).await
    }

    async fn dispatch(
        &self,
        email: Email,
        code: VerificationCode,
    ) -> Result<VerificationSession, VerificationError> {
        let rendered = render_verification_email(&code, self.config.valid_minutes())?;

        let timeout = self.config.send_timeout;
        tokio::time::timeout(
            timeout,
            self.sender
                .send(&email, rendered.subject, &rendered.html, &rendered.text),
        )
        .await
        .map_err(|_| DeliveryError::Timeout(timeout))??;

        let session = VerificationSession::new(email.clone(), code, Utc::now());
        let replacement = session.clone();
        self.sessions
            .entry(email.clone())
            .and_compute_with(|_| std::future::ready(Op::Put(replacement)))
            .await;

        info!(
            email = %email.redacted(),
            sender = self.sender.name(),
            "Verification code sent"
        );
        Ok(session)
    }

    /// Check `code` against the session for `email`.
    ///
    /// On `Verified` with a `profile_id`, the profile is marked verified.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::InvalidEmail` for a malformed address,
    /// `VerificationError::NoSession` if no code was issued for it, and
    /// `VerificationError::Store` if the profile cannot be updated.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        profile_id: Option<&ProfileId>,
    ) -> Result<VerifyOutcome, VerificationError> {
        let email = Email::parse(email)?;
        let now = Utc::now();
        let ttl = self.ttl();

        // Compare and store under the per-key compute lock; a concurrent
        // re-issue must not be replaced by this session.
        let mut checked = None;
        self.sessions
            .entry(email.clone())
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(entry) => {
                        let mut session = entry.into_value();
                        checked = Some((session.verify(code, now, ttl), session.attempts));
                        Op::Put(session)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        let (outcome, attempts) = checked.ok_or(VerificationError::NoSession)?;

        match outcome {
            VerifyOutcome::Verified => {
                info!(email = %email.redacted(), "Email verified");
                if let Some(id) = profile_id {
                    self.store
                        .update(id, |record| record.mark_email_verified(&email))
                        .await?;
                }
            }
            VerifyOutcome::Mismatch => {
                warn!(
                    email = %email.redacted(),
                    attempts,
                    "Verification code mismatch"
                );
            }
            VerifyOutcome::Expired => {
                info!(email = %email.redacted(), "Verification code expired");
            }
        }

        Ok(outcome)
    }

    /// Current session for `email`, if any.
    pub async fn session(&self, email: &Email) -> Option<VerificationSession> {
        self.sessions.get(email).await
    }

    fn ttl(&self) -> Option<chrono::Duration> {
        self.config
            .code_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
    }
}
