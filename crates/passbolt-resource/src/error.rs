use thiserror::Error;

use crate::CryptoError;

/// The server returned a resource without any secret shared with the current user.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Resource has no secret")]
pub struct MissingSecretError;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error(transparent)]
    MissingSecret(#[from] MissingSecretError),
    #[error("Resource has no encrypted metadata")]
    MissingMetadata,
    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unexpected object type {found:?}, expected {expected}")]
    ObjectType {
        expected: &'static str,
        found: Option<String>,
    },
    #[error("Metadata resource type {found} does not match resource type {expected}")]
    ResourceTypeMismatch {
        expected: uuid::Uuid,
        found: uuid::Uuid,
    },
}
