use thiserror::Error;

/// Outcome errors of the users resource. Each maps to one HTTP status.
///
/// Messages are safe to show to callers; storage detail is logged where the
/// error is produced and never carried here.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    MethodNotAllowed(String),
    #[error("{0}")]
    Internal(String),
}

impl UserError {
    pub fn invalid_fields() -> Self {
        Self::InvalidInput("Missing or invalid required fields!".into())
    }

    /// HTTP status code for this outcome
    pub fn status(&self) -> u16 {
        match self {
            UserError::InvalidInput(_) => 400,
            UserError::Conflict(_) => 400,
            UserError::NotFound(_) => 404,
            UserError::MethodNotAllowed(_) => 405,
            UserError::Internal(_) => 500,
        }
    }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            UserError::InvalidInput(_) => 1001,
            UserError::Conflict(_) => 1002,
            UserError::NotFound(_) => 1003,
            UserError::MethodNotAllowed(_) => 1004,
            UserError::Internal(_) => 1200,
        }
    }
}
