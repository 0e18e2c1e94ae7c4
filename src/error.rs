use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the ledger and webhook reconciliation layers.
///
/// Everything except [`LedgerError::Internal`] and
/// [`LedgerError::MalformedEnvelope`] is a caller error and carries a message
/// that is safe to return verbatim.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    NotFound(Uuid),

    #[error("User already exists")]
    Conflict(Uuid),

    #[error("webhook event {0} already recorded")]
    DuplicateEvent(String),

    #[error("Insufficient credits")]
    InsufficientCredits { available: i32, requested: i32 },

    #[error("malformed webhook envelope: {0}")]
    MalformedEnvelope(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The requested increment would push a balance past `i32::MAX`
    pub fn balance_overflow() -> Self {
        Self::validation("Credit balance would exceed the maximum")
    }

    /// True for failures whose detail must stay server-side.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::MalformedEnvelope(_) | Self::DuplicateEvent(_)
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
