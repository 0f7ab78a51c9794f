use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure codes reported by a remote record store.
///
/// Mirrors the error domain of the platform record services. Adapters map
/// their native codes onto these; anything without a counterpart becomes
/// [`RecordStoreErrorCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStoreErrorCode {
    /// No account is signed in on this device.
    NotAuthenticated,
    /// The account exists but cannot be used right now.
    AccountTemporarilyUnavailable,
    NetworkUnavailable,
    NetworkFailure,
    ServiceUnavailable,
    RequestRateLimited,
    QuotaExceeded,
    /// A single request carried more items than the store accepts.
    LimitExceeded,
    UnknownItem,
    ServerRecordChanged,
    InternalError,
    Other,
}

impl RecordStoreErrorCode {
    /// Codes that mean the user's account, not the request, is the problem.
    pub fn is_account_level(self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::AccountTemporarilyUnavailable
        )
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Record store error ({code:?}): {message}")]
    RecordStore {
        code: RecordStoreErrorCode,
        message: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn record_store(code: RecordStoreErrorCode, message: impl Into<String>) -> Self {
        Self::RecordStore {
            code,
            message: message.into(),
        }
    }

    /// Provider error code, if this error came from a record store.
    pub fn record_store_code(&self) -> Option<RecordStoreErrorCode> {
        match self {
            Self::RecordStore { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_level_codes() {
        assert!(RecordStoreErrorCode::NotAuthenticated.is_account_level());
        assert!(RecordStoreErrorCode::AccountTemporarilyUnavailable.is_account_level());
        assert!(!RecordStoreErrorCode::NetworkFailure.is_account_level());
        assert!(!RecordStoreErrorCode::LimitExceeded.is_account_level());
    }

    #[test]
    fn test_record_store_code_accessor() {
        let err = BridgeError::record_store(RecordStoreErrorCode::QuotaExceeded, "full");
        assert_eq!(
            err.record_store_code(),
            Some(RecordStoreErrorCode::QuotaExceeded)
        );
        assert!(err.to_string().contains("full"));

        let other = BridgeError::OperationFailed("boom".into());
        assert_eq!(other.record_store_code(), None);
    }
}
