use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical classification of a failed operation, independent of the
/// library service's wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    InputValidation,
    BorrowingDisabled,
    BookUnavailable,
    BorrowLimitReached,
    RecordNotFound,
    BookNotFound,
    NetworkFailure,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Unauthenticated,
    InputValidation,
    BackendRejected,
    NetworkFailure,
    Unknown,
}

impl ErrorKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::Unauthenticated => ErrorCategory::Unauthenticated,
            Self::InputValidation => ErrorCategory::InputValidation,
            Self::BorrowingDisabled
            | Self::BookUnavailable
            | Self::BorrowLimitReached
            | Self::RecordNotFound
            | Self::BookNotFound => ErrorCategory::BackendRejected,
            Self::NetworkFailure => ErrorCategory::NetworkFailure,
            Self::Unknown => ErrorCategory::Unknown,
        }
    }

    /// Fixed user-facing template. `None` for kinds whose text depends on the
    /// failing operation or on the raw message.
    pub fn template(self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => Some("Your session has ended. Please sign in again."),
            Self::BorrowingDisabled => Some(
                "Your borrowing permission is disabled. Settle any outstanding fines and contact the library.",
            ),
            Self::BookUnavailable => Some("This book is not available for borrowing right now."),
            Self::BorrowLimitReached => Some(
                "You have reached your borrowing limit. Return a book before borrowing another.",
            ),
            Self::RecordNotFound => Some("No active loan of this book was found on your account."),
            Self::BookNotFound => Some("No book with this ID exists in the catalog."),
            Self::NetworkFailure => Some(
                "Network error: the library service could not be reached. Please try again.",
            ),
            Self::InputValidation | Self::Unknown => None,
        }
    }
}

pub const UNPARSEABLE_RESPONSE_MESSAGE: &str = "Unexpected response from the library service.";

/// Kind plus the message to show for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct Classified {
    pub kind: ErrorKind,
    pub message: String,
}

impl Classified {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Uses the kind's fixed template; `Unknown` labels and passes `raw`
    /// through.
    pub fn from_kind(kind: ErrorKind, raw: &str) -> Self {
        let message = match kind.template() {
            Some(template) => template.to_string(),
            None if kind == ErrorKind::Unknown => format!("Unrecognized error: {raw}"),
            None => raw.to_string(),
        };
        Self { kind, message }
    }

    pub fn unparseable() -> Self {
        Self::new(ErrorKind::Unknown, UNPARSEABLE_RESPONSE_MESSAGE)
    }
}
