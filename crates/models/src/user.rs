use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Collection name user records are stored under.
pub const COLLECTION: &str = "users";

const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;
const NAME_MAX_CHARS: usize = 64;
const PASSWORD_MAX_CHARS: usize = 256;

/// A user as persisted in the record store, keyed by `phone`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub tos_agreement: bool,
    pub hashed_password: String,
}

/// Caller-facing view of a user. Has no password field at all, so the
/// stored hash cannot end up in a response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub tos_agreement: bool,
}

impl From<UserRecord> for PublicUser {
    fn from(record: UserRecord) -> Self {
        Self {
            first_name: record.first_name,
            last_name: record.last_name,
            phone: record.phone,
            tos_agreement: record.tos_agreement,
        }
    }
}

impl UserRecord {
    /// Serialize for the record store.
    pub fn to_document(&self) -> Result<serde_json::Value, ModelError> {
        serde_json::to_value(self).map_err(|e| ModelError::Serialize(e.to_string()))
    }
}

/// `+` optional, then 7 to 15 ASCII digits.
pub fn validate_phone_number(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_name(value: &str) -> bool {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > NAME_MAX_CHARS {
        return false;
    }
    trimmed
        .chars()
        .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.'))
}

pub fn validate_password(value: &str) -> bool {
    !value.trim().is_empty()
        && value.chars().count() <= PASSWORD_MAX_CHARS
        && !value.chars().any(char::is_control)
}
