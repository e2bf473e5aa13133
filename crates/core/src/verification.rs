//! One-time verification codes and the email verification handshake.
//!
//! A [`VerificationSession`] is created when a code is issued for an email
//! address and moves through:
//!
//! ```text
//! Pending --(correct code)--> Verified   (terminal)
//! Pending --(wrong code)----> Pending    (attempts += 1, no lockout)
//! Pending --(past ttl)------> answers Expired, stays Pending
//! ```

use core::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Email;

/// Errors that can occur when parsing a [`VerificationCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// The code is not exactly six characters long.
    #[error("verification code must be exactly 6 digits")]
    WrongLength,
    /// The code contains a non-digit character.
    #[error("verification code must only contain digits")]
    NotNumeric,
    /// The code starts with a zero.
    #[error("verification code must be between 100000 and 999999")]
    OutOfRange,
}

/// A six-digit decimal one-time code in `100000..=999999`.
///
/// The lower bound means the code never has a leading zero and is always six
/// characters when printed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Smallest code that can be issued.
    pub const MIN: u32 = 100_000;
    /// Largest code that can be issued.
    pub const MAX: u32 = 999_999;

    /// Generate a uniformly random code.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generate a code from the given random source.
    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let code: u32 = rng.random_range(Self::MIN..=Self::MAX);
        Self(code.to_string())
    }

    /// Parse a client-supplied code.
    ///
    /// No trimming is applied.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input is six ASCII digits without a
    /// leading zero.
    pub fn parse(s: &str) -> Result<Self, CodeError> {
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::NotNumeric);
        }
        if s.len() != 6 {
            return Err(CodeError::WrongLength);
        }
        if s.starts_with('0') {
            return Err(CodeError::OutOfRange);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are credentials; keep them out of Debug output.
impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationCode(******)")
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VerificationCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VerificationCode> for String {
    fn from(code: VerificationCode) -> Self {
        code.0
    }
}

/// Lifecycle state of a [`VerificationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
}

/// Result of comparing an entered code against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// The code matched; the session is now verified.
    Verified,
    /// The code did not match; the session is still pending.
    Mismatch,
    /// The session is older than the configured time-to-live.
    Expired,
}

/// A code issued for one email address, retained for comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSession {
    pub email: Email,
    pub code: VerificationCode,
    pub issued_at: DateTime<Utc>,
    pub status: VerificationStatus,
    /// Mismatched attempts so far. Informational only; there is no lockout.
    pub attempts: u32,
}

impl VerificationSession {
    /// Create a pending session for a freshly issued code.
    #[must_use]
    pub const fn new(email: Email, code: VerificationCode, issued_at: DateTime<Utc>) -> Self {
        Self {
            email,
            code,
            issued_at,
            status: VerificationStatus::Pending,
            attempts: 0,
        }
    }

    /// Whether the session reached the terminal verified state.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }

    /// When the code stops being accepted, if a time-to-live applies.
    #[must_use]
    pub fn expires_at(&self, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.map(|ttl| self.issued_at + ttl)
    }

    /// Whether `now` is past the time-to-live. Verified sessions never expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        if self.is_verified() {
            return false;
        }
        ttl.is_some_and(|ttl| now - self.issued_at > ttl)
    }

    /// Compare `entered` with the issued code.
    ///
    /// Comparison is exact string equality: no trimming, no normalisation.
    /// Expiry is checked first, so an expired session never becomes verified.
    pub fn verify(
        &mut self,
        entered: &str,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> VerifyOutcome {
        if self.is_expired(now, ttl) {
            return VerifyOutcome::Expired;
        }

        if entered == self.code.as_str() {
            self.status = VerificationStatus::Verified;
            VerifyOutcome::Verified
        } else {
            self.attempts = self.attempts.saturating_add(1);
            VerifyOutcome::Mismatch
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn session(code: &str) -> VerificationSession {
        VerificationSession::new(
            Email::parse("a@b.com").unwrap(),
            VerificationCode::parse(code).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_generate_verification_code_format() {
        let code = VerificationCode::generate();
        assert_eq!(code.as_str().len(), 6);
        assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_verification_code_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let code: u32 = VerificationCode::generate_with(&mut rng)
                .as_str()
                .parse()
                .unwrap();
            assert!((VerificationCode::MIN..=VerificationCode::MAX).contains(&code));
        }
    }

    #[test]
    fn test_generated_codes_parse() {
        for _ in 0..100 {
            let code = VerificationCode::generate();
            assert_eq!(VerificationCode::parse(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        assert_eq!(VerificationCode::parse(""), Err(CodeError::WrongLength));
        assert_eq!(VerificationCode::parse("12345"), Err(CodeError::WrongLength));
        assert_eq!(VerificationCode::parse("1234567"), Err(CodeError::WrongLength));
        assert_eq!(VerificationCode::parse("12a456"), Err(CodeError::NotNumeric));
        assert_eq!(VerificationCode::parse(" 23456"), Err(CodeError::NotNumeric));
        assert_eq!(VerificationCode::parse("012345"), Err(CodeError::OutOfRange));
        assert!(VerificationCode::parse("100000").is_ok());
        assert!(VerificationCode::parse("999999").is_ok());
    }

    #[test]
    fn test_debug_hides_code() {
        let code = VerificationCode::parse("123456").unwrap();
        assert!(!format!("{code:?}").contains("123456"));
    }

    #[test]
    fn test_verify_correct_code() {
        let mut s = session("123456");
        assert_eq!(s.verify("123456", Utc::now(), None), VerifyOutcome::Verified);
        assert!(s.is_verified());
    }

    #[test]
    fn test_verify_mismatch_stays_pending() {
        let mut s = session("123456");
        assert_eq!(s.verify("000000", Utc::now(), None), VerifyOutcome::Mismatch);
        assert_eq!(s.status, VerificationStatus::Pending);
        assert_eq!(s.attempts, 1);

        // Re-entry is allowed after any number of mismatches.
        for _ in 0..20 {
            s.verify("999999", Utc::now(), None);
        }
        assert_eq!(s.verify("123456", Utc::now(), None), VerifyOutcome::Verified);
    }

    #[test]
    fn test_verify_is_whitespace_sensitive() {
        let mut s = session("123456");
        assert_eq!(s.verify(" 123456", Utc::now(), None), VerifyOutcome::Mismatch);
        assert_eq!(s.verify("123456 ", Utc::now(), None), VerifyOutcome::Mismatch);
        assert_eq!(s.status, VerificationStatus::Pending);
    }

    #[test]
    fn test_verified_is_terminal() {
        let mut s = session("123456");
        s.verify("123456", Utc::now(), None);
        assert_eq!(s.verify("000000", Utc::now(), None), VerifyOutcome::Mismatch);
        assert!(s.is_verified());
        assert_eq!(s.verify("123456", Utc::now(), None), VerifyOutcome::Verified);
    }

    #[test]
    fn test_expiry() {
        let mut s = session("123456");
        let ttl = Some(Duration::minutes(10));
        let later = s.issued_at + Duration::minutes(11);

        assert!(s.is_expired(later, ttl));
        assert_eq!(s.verify("123456", later, ttl), VerifyOutcome::Expired);
        assert_eq!(s.status, VerificationStatus::Pending);

        let within = s.issued_at + Duration::minutes(9);
        assert_eq!(s.verify("123456", within, ttl), VerifyOutcome::Verified);
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let mut s = session("123456");
        let much_later = s.issued_at + Duration::days(365);
        assert!(!s.is_expired(much_later, None));
        assert_eq!(s.verify("123456", much_later, None), VerifyOutcome::Verified);
    }

    #[test]
    fn test_expires_at() {
        let s = session("123456");
        assert_eq!(s.expires_at(None), None);
        assert_eq!(
            s.expires_at(Some(Duration::minutes(10))),
            Some(s.issued_at + Duration::minutes(10))
        );
    }
}
