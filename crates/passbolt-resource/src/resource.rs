use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A resource as returned by the passbolt API.
///
/// Legacy resources carry their name, username, URI and description in plaintext on the
/// envelope. Resources using a v5 type leave those empty and store them in the armored
/// `metadata` instead.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct Resource {
    pub id: Uuid,
    #[serde(default)]
    pub folder_parent_id: Option<Uuid>,
    pub resource_type_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Armored metadata, only present on v5 resources.
    #[serde(default)]
    pub metadata: Option<String>,
    /// Secrets shared with the current user. Empty unless secrets were requested.
    #[serde(default)]
    pub secrets: Vec<Secret>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Resource {
    /// The secret to decrypt, if the server returned one.
    pub fn secret(&self) -> Option<&Secret> {
        self.secrets.first()
    }
}

/// An armored secret, encrypted for the current user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct Secret {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub data: String,
}

/// Describes how a resource's secret and metadata are laid out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct ResourceType {
    pub id: Uuid,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ResourceType {
    /// The schema for this type, or `None` if the slug is not one we know how to decrypt.
    pub fn schema(&self) -> Option<ResourceSchema> {
        ResourceSchema::from_slug(&self.slug)
    }
}

/// Known resource type slugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ResourceSchema {
    PasswordString,
    PasswordAndDescription,
    PasswordDescriptionTotp,
    Totp,
    V5Default,
    V5PasswordString,
    V5DefaultWithTotp,
    V5TotpStandalone,
}

impl ResourceSchema {
    /// Parse a resource type slug.
    pub fn from_slug(slug: &str) -> Option<Self> {
        Some(match slug {
            "password-string" => Self::PasswordString,
            "password-and-description" => Self::PasswordAndDescription,
            "password-description-totp" => Self::PasswordDescriptionTotp,
            "totp" => Self::Totp,
            "v5-default" => Self::V5Default,
            "v5-password-string" => Self::V5PasswordString,
            "v5-default-with-totp" => Self::V5DefaultWithTotp,
            "v5-totp-standalone" => Self::V5TotpStandalone,
            _ => return None,
        })
    }

    #[allow(missing_docs)]
    pub fn slug(self) -> &'static str {
        match self {
            Self::PasswordString => "password-string",
            Self::PasswordAndDescription => "password-and-description",
            Self::PasswordDescriptionTotp => "password-description-totp",
            Self::Totp => "totp",
            Self::V5Default => "v5-default",
            Self::V5PasswordString => "v5-password-string",
            Self::V5DefaultWithTotp => "v5-default-with-totp",
            Self::V5TotpStandalone => "v5-totp-standalone",
        }
    }

    /// Whether the resource keeps its metadata encrypted instead of on the envelope.
    pub fn has_encrypted_metadata(self) -> bool {
        matches!(
            self,
            Self::V5Default
                | Self::V5PasswordString
                | Self::V5DefaultWithTotp
                | Self::V5TotpStandalone
        )
    }

    /// Whether the secret is the bare password rather than a JSON document.
    pub(crate) fn has_plain_secret(self) -> bool {
        self == Self::PasswordString
    }

    /// Whether the description lives in the secret rather than in the metadata or envelope.
    pub(crate) fn description_in_secret(self) -> bool {
        matches!(
            self,
            Self::PasswordAndDescription
                | Self::PasswordDescriptionTotp
                | Self::V5Default
                | Self::V5DefaultWithTotp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_legacy_resource() {
        let resource: Resource = serde_json::from_value(serde_json::json!({
            "id": "8d7a5f5e-3a8b-4b2f-9a4c-0f6c3a9d2e11",
            "folder_parent_id": null,
            "resource_type_id": "669f8c64-242a-59fb-92fc-81f660975fd3",
            "name": "Server A",
            "username": "root",
            "uri": "ssh://a.example.com",
            "description": null,
            "created": "2023-05-01T12:00:00+00:00",
            "modified": "2023-06-01T12:00:00+00:00",
            "secrets": [{ "data": "-----BEGIN PGP MESSAGE-----" }]
        }))
        .unwrap();

        assert_eq!(resource.name.as_deref(), Some("Server A"));
        assert_eq!(resource.description, None);
        assert_eq!(resource.metadata, None);
        assert_eq!(resource.secret().unwrap().data, "-----BEGIN PGP MESSAGE-----");
    }

    #[test]
    fn test_deserialize_without_secrets() {
        let resource: Resource = serde_json::from_value(serde_json::json!({
            "id": "8d7a5f5e-3a8b-4b2f-9a4c-0f6c3a9d2e11",
            "resource_type_id": "669f8c64-242a-59fb-92fc-81f660975fd3",
            "metadata": "-----BEGIN PGP MESSAGE-----",
            "created": "2023-05-01T12:00:00Z",
            "modified": "2023-05-01T12:00:00Z"
        }))
        .unwrap();

        assert!(resource.secret().is_none());
        assert_eq!(resource.folder_parent_id, None);
    }

    #[test]
    fn test_schema_slugs() {
        for schema in [
            ResourceSchema::PasswordString,
            ResourceSchema::PasswordAndDescription,
            ResourceSchema::PasswordDescriptionTotp,
            ResourceSchema::Totp,
            ResourceSchema::V5Default,
            ResourceSchema::V5PasswordString,
            ResourceSchema::V5DefaultWithTotp,
            ResourceSchema::V5TotpStandalone,
        ] {
            assert_eq!(ResourceSchema::from_slug(schema.slug()), Some(schema));
        }
        assert_eq!(ResourceSchema::from_slug("v6-quantum"), None);
    }

    #[test]
    fn test_schema_layout() {
        assert!(!ResourceSchema::PasswordAndDescription.has_encrypted_metadata());
        assert!(ResourceSchema::V5PasswordString.has_encrypted_metadata());
        assert!(ResourceSchema::PasswordString.has_plain_secret());
        assert!(!ResourceSchema::V5PasswordString.has_plain_secret());
        assert!(ResourceSchema::V5Default.description_in_secret());
        assert!(!ResourceSchema::V5PasswordString.description_in_secret());
    }
}
