//! Collaborators the listing depends on.
//!
//! Implementations are expected to be cheap to share between tasks; the lister holds them in
//! an [Arc](std::sync::Arc) and calls them concurrently.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{Resource, ResourceType};

/// Narrows which resources the server returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    /// Only resources the user marked as favorite.
    pub favorite: bool,
    /// Only resources owned by the user.
    pub own: bool,
    /// Only resources shared with this group.
    pub shared_with_group: Option<Uuid>,
    /// Only resources in one of these folders.
    pub folder_parents: Vec<Uuid>,
}

/// A request for [ResourceApi::fetch_resources].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResourcesRequest {
    #[allow(missing_docs)]
    pub query: ResourceQuery,
    /// Return the secrets shared with the user alongside each resource.
    pub include_secrets: bool,
    /// Return each resource's type alongside it.
    pub include_resource_types: bool,
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Received error message from server: [{status}] {message}")]
    ResponseContent { status: u16, message: String },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("Request failed: {0}")]
    Transport(String),
}

/// Error returned by a [SecretDecryptor].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Decryption failed: {0}")]
pub struct CryptoError(pub String);

/// Fetches resources from the server.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// List the resources matching `request`, in server order.
    async fn fetch_resources(
        &self,
        request: &FetchResourcesRequest,
    ) -> Result<Vec<Resource>, ApiError>;
}

/// Fetches resource type definitions from the server.
#[async_trait]
pub trait ResourceTypeApi: Send + Sync {
    /// Get a single resource type by id.
    async fn fetch_resource_type(&self, id: Uuid) -> Result<ResourceType, ApiError>;
}

/// Decrypts armored messages with the current user's private key.
#[async_trait]
pub trait SecretDecryptor: Send + Sync {
    /// Decrypt `ciphertext`, returning the plaintext.
    async fn decrypt_ciphertext(&self, ciphertext: &str) -> Result<String, CryptoError>;
}
