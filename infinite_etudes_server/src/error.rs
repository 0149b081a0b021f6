// Server-side error types.
//
// `StoreError` is what an `ArtifactStore` returns. `EtudeError` is the outcome
// a failed resolution hands back to the leader and to every waiter on the same
// ticket, so it is `Clone` and carries rendered messages rather than the
// underlying (non-`Clone`) `io::Error` / `GenerateError` values.

use std::io;
use std::time::Duration;

use thiserror::Error;

use infinite_etudes_music::GenerateError;

use crate::key::ArtifactKey;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op} {key}: {source}")]
    Io {
        op: &'static str,
        key: ArtifactKey,
        #[source]
        source: io::Error,
    },
    #[error("artifact directory {path}: {source}")]
    Dir {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("no artifact stored under {0}")]
    NotFound(ArtifactKey),
}

impl StoreError {
    pub(crate) fn io(op: &'static str, key: &ArtifactKey, source: io::Error) -> Self {
        StoreError::Io {
            op,
            key: key.clone(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EtudeError {
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("storage failed: {0}")]
    Storage(String),
    #[error("timed out after {waited:?} waiting for {key}")]
    Timeout { key: ArtifactKey, waited: Duration },
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<GenerateError> for EtudeError {
    fn from(e: GenerateError) -> Self {
        EtudeError::Generation(e.to_string())
    }
}

impl From<StoreError> for EtudeError {
    fn from(e: StoreError) -> Self {
        EtudeError::Storage(e.to_string())
    }
}
