use std::{fmt, mem};

use serde::{de::DeserializeOwned, Deserialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{DecryptError, MissingSecretError, Resource, ResourceType, SecretDecryptor};

const METADATA_OBJECT_TYPE: &str = "PASSBOLT_RESOURCE_METADATA";
const SECRET_OBJECT_TYPE: &str = "PASSBOLT_SECRET_DATA";

/// The plaintext fields of a single resource.
#[derive(Clone, Default, PartialEq)]
pub struct ResourceFields {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub username: String,
    /// The primary URI.
    pub uri: String,
    #[allow(missing_docs)]
    pub password: Zeroizing<String>,
    #[allow(missing_docs)]
    pub description: Zeroizing<String>,
}

impl ResourceFields {
    /// The fields available without decrypting anything. For v5 resources all of these are
    /// empty, as the server only knows their encrypted metadata.
    pub fn from_envelope(resource: &Resource) -> Self {
        Self {
            name: resource.name.clone().unwrap_or_default(),
            username: resource.username.clone().unwrap_or_default(),
            uri: resource.uri.clone().unwrap_or_default(),
            password: Zeroizing::default(),
            description: Zeroizing::new(resource.description.clone().unwrap_or_default()),
        }
    }
}

impl fmt::Debug for ResourceFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFields")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("uri", &self.uri)
            .field("password", &"********")
            .field("description", &"********")
            .finish()
    }
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct MetadataPayload {
    #[serde(default)]
    object_type: Option<String>,
    #[serde(default)]
    #[zeroize(skip)]
    resource_type_id: Option<Uuid>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    uris: Vec<String>,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct SecretPayload {
    #[serde(default)]
    object_type: Option<String>,
    #[serde(default)]
    password: String,
    #[serde(default)]
    description: String,
}

/// Turns an encrypted [Resource] into its plaintext [ResourceFields].
pub struct ResourceDecryptor<'a> {
    crypto: &'a dyn SecretDecryptor,
}

impl<'a> ResourceDecryptor<'a> {
    #[allow(missing_docs)]
    pub fn new(crypto: &'a dyn SecretDecryptor) -> Self {
        Self { crypto }
    }

    /// Decrypt `resource`, which must be of `resource_type`.
    ///
    /// When `need_secrets` is false and the type keeps its metadata on the envelope, no
    /// decryption happens and the envelope fields are returned with an empty password.
    /// Otherwise the first secret is decrypted, along with the metadata for v5 types.
    pub async fn decrypt(
        &self,
        resource: &Resource,
        resource_type: &ResourceType,
        need_secrets: bool,
    ) -> Result<ResourceFields, DecryptError> {
        let schema = resource_type
            .schema()
            .ok_or_else(|| DecryptError::UnsupportedResourceType(resource_type.slug.clone()))?;

        if !need_secrets && !schema.has_encrypted_metadata() {
            return Ok(ResourceFields::from_envelope(resource));
        }

        let secret = resource.secret().ok_or(MissingSecretError)?;

        let mut fields = if schema.has_encrypted_metadata() {
            self.decrypt_metadata(resource).await?
        } else {
            ResourceFields::from_envelope(resource)
        };

        let plaintext = Zeroizing::new(self.crypto.decrypt_ciphertext(&secret.data).await?);
        if schema.has_plain_secret() {
            fields.password = plaintext;
            return Ok(fields);
        }

        let mut payload: SecretPayload = parse_payload(&plaintext, "secret")?;
        if schema.has_encrypted_metadata() {
            expect_object_type(SECRET_OBJECT_TYPE, &payload.object_type)?;
        }
        fields.password = Zeroizing::new(mem::take(&mut payload.password));
        if schema.description_in_secret() {
            fields.description = Zeroizing::new(mem::take(&mut payload.description));
        }

        Ok(fields)
    }

    async fn decrypt_metadata(&self, resource: &Resource) -> Result<ResourceFields, DecryptError> {
        let armored = resource
            .metadata
            .as_deref()
            .ok_or(DecryptError::MissingMetadata)?;
        let plaintext = Zeroizing::new(self.crypto.decrypt_ciphertext(armored).await?);

        let mut metadata: MetadataPayload = parse_payload(&plaintext, "metadata")?;
        expect_object_type(METADATA_OBJECT_TYPE, &metadata.object_type)?;
        if let Some(found) = metadata.resource_type_id {
            if found != resource.resource_type_id {
                return Err(DecryptError::ResourceTypeMismatch {
                    expected: resource.resource_type_id,
                    found,
                });
            }
        }

        Ok(ResourceFields {
            name: mem::take(&mut metadata.name),
            username: mem::take(&mut metadata.username),
            uri: metadata.uris.first().cloned().unwrap_or_default(),
            password: Zeroizing::default(),
            description: Zeroizing::new(mem::take(&mut metadata.description)),
        })
    }
}

fn parse_payload<T: DeserializeOwned>(
    plaintext: &str,
    kind: &'static str,
) -> Result<T, DecryptError> {
    serde_json::from_str(plaintext).map_err(|source| DecryptError::InvalidPayload { kind, source })
}

fn expect_object_type(expected: &'static str, found: &Option<String>) -> Result<(), DecryptError> {
    match found.as_deref() {
        Some(found) if found == expected => Ok(()),
        _ => Err(DecryptError::ObjectType {
            expected,
            found: found.clone(),
        }),
    }
}
