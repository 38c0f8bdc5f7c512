use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// POST payload. Every field is optional at the type level so a missing
/// field and a bad one are reported the same way.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub tos_agreement: Option<bool>,
}

/// PUT payload: `phone` locates the record, the rest are optional changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

impl CreateUserInput {
    pub fn trimmed(self) -> Self {
        Self {
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            phone: trimmed(self.phone),
            password: trimmed(self.password),
            tos_agreement: self.tos_agreement,
        }
    }
}

impl UpdateUserInput {
    pub fn trimmed(self) -> Self {
        Self {
            phone: trimmed(self.phone),
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            password: trimmed(self.password),
        }
    }
}

/// A request as delivered by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct UserRequest {
    pub method: String,
    pub query: HashMap<String, String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub message: String,
}
