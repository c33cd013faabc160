#![doc = include_str!("../README.md")]

mod api;
mod decrypt;
mod decrypted_resource;
mod error;
mod field;
mod filter;
mod list;
mod pipeline;
mod resource;
mod resource_type_cache;
mod settings;

pub use api::{
    ApiError, CryptoError, FetchResourcesRequest, ResourceApi, ResourceQuery, ResourceTypeApi,
    SecretDecryptor,
};
pub use decrypt::{ResourceDecryptor, ResourceFields};
pub use decrypted_resource::DecryptedResource;
pub use error::{DecryptError, MissingSecretError};
pub use field::{parse_columns, ResourceField, UnknownColumnError};
pub use filter::{references_any, resource_environment, ResourceFilter};
pub use list::{need_secrets, ListError, ListResourcesRequest, OutputFormat, ResourceLister};
pub use pipeline::{DecryptionPipeline, PipelineError, MAX_DECRYPTION_WORKERS};
pub use resource::{Resource, ResourceSchema, ResourceType, Secret};
pub use resource_type_cache::ResourceTypeCache;
pub use settings::ListSettings;
