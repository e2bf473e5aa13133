//! Profile identifiers and loosely-typed profile records.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Email;

/// Errors that can occur when parsing a [`ProfileId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileIdError {
    /// The input string is empty.
    #[error("profile id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("profile id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains control characters.
    #[error("profile id cannot contain control characters")]
    ControlCharacter,
}

/// Key of one profile in the profile document.
///
/// Browsers send this as `pin`. The value is client-chosen and not secret;
/// the only constraints are the ones needed for it to be a usable JSON key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

impl ProfileId {
    /// Maximum length of a profile id.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `ProfileId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or contains control
    /// characters.
    pub fn parse(s: &str) -> Result<Self, ProfileIdError> {
        if s.is_empty() {
            return Err(ProfileIdError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(ProfileIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_control) {
            return Err(ProfileIdError::ControlCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProfileId {
    type Err = ProfileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProfileId {
    type Error = ProfileIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

/// One child/parent profile: name, pronouns, preferences, story progress.
///
/// No schema is enforced at the store boundary. Fields the backend itself
/// writes are exposed as constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileRecord(Map<String, Value>);

impl ProfileRecord {
    /// Field set to `true` once the profile's email has been verified.
    pub const EMAIL_VERIFIED: &'static str = "emailVerified";
    /// Field holding the address that was verified.
    pub const VERIFIED_EMAIL: &'static str = "verifiedEmail";

    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from an arbitrary JSON value.
    ///
    /// Returns `None` unless the value is a JSON object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a string field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Record that `email` has been verified for this profile.
    pub fn mark_email_verified(&mut self, email: &Email) {
        self.0
            .insert(Self::EMAIL_VERIFIED.to_owned(), Value::Bool(true));
        self.0.insert(
            Self::VERIFIED_EMAIL.to_owned(),
            Value::String(email.as_str().to_owned()),
        );
    }

    /// Whether the profile has a verified email.
    #[must_use]
    pub fn is_email_verified(&self) -> bool {
        self.0
            .get(Self::EMAIL_VERIFIED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record and return the underlying JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ProfileRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<ProfileRecord> for Value {
    fn from(record: ProfileRecord) -> Self {
        Self::Object(record.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_profile_id_parse() {
        assert_eq!(ProfileId::parse("1234").unwrap().as_str(), "1234");
        assert_eq!(ProfileId::parse(""), Err(ProfileIdError::Empty));
        assert_eq!(
            ProfileId::parse("ab\ncd"),
            Err(ProfileIdError::ControlCharacter)
        );
        assert!(matches!(
            ProfileId::parse(&"x".repeat(129)),
            Err(ProfileIdError::TooLong { max: 128 })
        ));
    }

    #[test]
    fn test_profile_id_keeps_whitespace() {
        // Ids are opaque; " 12" and "12" are different profiles.
        assert_ne!(ProfileId::parse(" 12").unwrap(), ProfileId::parse("12").unwrap());
    }

    #[test]
    fn test_record_from_value_requires_object() {
        assert!(ProfileRecord::from_value(json!({"name": "Alice"})).is_some());
        assert!(ProfileRecord::from_value(json!([1, 2])).is_none());
        assert!(ProfileRecord::from_value(json!("Alice")).is_none());
        assert!(ProfileRecord::from_value(Value::Null).is_none());
    }

    #[test]
    fn test_record_serializes_transparently() {
        let record = ProfileRecord::from_value(json!({"name": "Alice", "age": 6})).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"name": "Alice", "age": 6}));
    }

    #[test]
    fn test_mark_email_verified() {
        let mut record = ProfileRecord::new();
        assert!(!record.is_email_verified());

        record.mark_email_verified(&Email::parse("a@b.com").unwrap());

        assert!(record.is_email_verified());
        assert_eq!(record.get_str(ProfileRecord::VERIFIED_EMAIL), Some("a@b.com"));
    }
}
