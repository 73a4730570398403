use crate::course::{AssetSlot, MediaCategory};
use crate::storage::StorageError;
use thiserror::Error;

/// Failure of a single asset within a batch
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("{slot}: no local file to upload")]
    MissingAsset { slot: AssetSlot },

    #[error("{slot}: expected {expected} file, got {found}")]
    InvalidAssetType {
        slot: AssetSlot,
        expected: MediaCategory,
        found: String,
    },

    #[error("{slot}: course title is blank, no storage key can be derived")]
    BlankTitle { slot: AssetSlot },

    #[error("{slot}: failed to store {key}: {source}")]
    TransportFailure {
        slot: AssetSlot,
        key: String,
        #[source]
        source: StorageError,
    },
}

impl AssetError {
    pub fn slot(&self) -> AssetSlot {
        match self {
            AssetError::MissingAsset { slot }
            | AssetError::BlankTitle { slot }
            | AssetError::InvalidAssetType { slot, .. }
            | AssetError::TransportFailure { slot, .. } => *slot,
        }
    }

    /// The store may hold the object even though the call failed
    pub fn may_have_stored(&self) -> bool {
        matches!(
            self,
            AssetError::TransportFailure {
                source: StorageError::Timeout(_),
                ..
            }
        )
    }
}

/// Failure of a whole upload call
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("upload aborted: {source}")]
    Aborted {
        #[source]
        source: AssetError,
        /// Keys uploaded earlier in the batch that are still in storage
        orphaned_keys: Vec<String>,
    },

    #[error("malformed course record: {0}")]
    MalformedCourse(String),
}
