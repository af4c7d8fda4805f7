//! Error taxonomy shared by every registry operation.
//!
//! Callers branch on [`ErrorKind`]; the [`RegistryError`] variants carry the
//! detail that goes to the log. End users only ever see
//! [`RegistryError::public_message`].

use serde::Serialize;
use std::fmt;

/// Machine-checkable category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::StorageFailure => "STORAGE_FAILURE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage failure during {operation}: {detail}")]
    Storage {
        operation: &'static str,
        detail: String,
    },

    /// A stored row could not be decoded into a valid entity.
    #[error("corrupted {what} in storage")]
    Corruption { what: &'static str },
}

impl RegistryError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn storage(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            detail: detail.into(),
        }
    }

    pub fn corruption(what: &'static str) -> Self {
        Self::Corruption { what }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage { .. } | Self::Corruption { .. } => ErrorKind::StorageFailure,
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Validation and conflict messages are built from the caller's own input,
    /// so they are passed through. Storage details never are.
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("{} not found", entity),
            Self::InvalidInput(message) | Self::Conflict(message) => message.clone(),
            Self::Storage { .. } | Self::Corruption { .. } => {
                "An internal error occurred. Please try again later.".to_string()
            }
        }
    }
}
