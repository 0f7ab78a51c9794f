use bridge_traits::{BridgeError, RecordStoreErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The user is signed out or the account is temporarily unusable.
    #[error("Record store account unavailable: {0}")]
    AccountUnavailable(#[source] BridgeError),

    #[error("Sync failed: {0}")]
    General(#[source] BridgeError),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn is_account_unavailable(&self) -> bool {
        matches!(self, Self::AccountUnavailable(_))
    }

    /// Provider error code behind this error, if it came from the record store.
    pub fn record_store_code(&self) -> Option<RecordStoreErrorCode> {
        match self {
            Self::AccountUnavailable(source) | Self::General(source) => source.record_store_code(),
            _ => None,
        }
    }
}

/// Classifies bridge failures.
///
/// `NotAuthenticated` and `AccountTemporarilyUnavailable` become
/// [`SyncError::AccountUnavailable`]; cancellation stays cancellation; every
/// other failure is [`SyncError::General`].
impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        if matches!(err, BridgeError::Cancelled) {
            return Self::Cancelled;
        }
        match err.record_store_code() {
            Some(code) if code.is_account_level() => Self::AccountUnavailable(err),
            _ => Self::General(err),
        }
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::Bridge(inner) => inner.into(),
            other => Self::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
