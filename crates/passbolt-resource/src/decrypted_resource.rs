use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use passbolt_filter::{Activation, Value};
use serde::{Serialize, Serializer};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{Resource, ResourceField, ResourceFields};

/// A listed resource together with its plaintext fields.
///
/// Fields that were not decrypted hold whatever the envelope carried, which is empty for v5
/// resources and for passwords.
#[derive(Clone)]
pub struct DecryptedResource {
    /// The resource as fetched.
    pub resource: Resource,
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub username: String,
    #[allow(missing_docs)]
    pub uri: String,
    #[allow(missing_docs)]
    pub password: Zeroizing<String>,
    #[allow(missing_docs)]
    pub description: Zeroizing<String>,
    /// Position of the resource in the list returned by the server.
    pub ordinal: usize,
}

impl DecryptedResource {
    pub(crate) fn new(resource: Resource, fields: ResourceFields, ordinal: usize) -> Self {
        let ResourceFields {
            name,
            username,
            uri,
            password,
            description,
        } = fields;
        Self {
            resource,
            name,
            username,
            uri,
            password,
            description,
            ordinal,
        }
    }

    #[allow(missing_docs)]
    pub fn id(&self) -> Uuid {
        self.resource.id
    }

    /// The value of `field` as it should be rendered in a table cell.
    ///
    /// Server controlled text has control characters removed so it cannot drive the terminal.
    pub fn column_value(&self, field: ResourceField) -> String {
        let value = self.plain_value(field);
        if field.is_sensitive() {
            strip_unsafe(&value)
        } else {
            value
        }
    }

    fn plain_value(&self, field: ResourceField) -> String {
        match field {
            ResourceField::Id => self.resource.id.to_string(),
            ResourceField::FolderParentId => self
                .resource
                .folder_parent_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            ResourceField::Name => self.name.clone(),
            ResourceField::Username => self.username.clone(),
            ResourceField::Uri => self.uri.clone(),
            ResourceField::Password => self.password.as_str().to_owned(),
            ResourceField::Description => self.description.as_str().to_owned(),
            ResourceField::CreatedTimestamp => format_timestamp(&self.resource.created),
            ResourceField::ModifiedTimestamp => format_timestamp(&self.resource.modified),
        }
    }

    /// One table row with a cell per column.
    pub fn row(&self, columns: &[ResourceField]) -> Vec<String> {
        columns
            .iter()
            .map(|column| self.column_value(*column))
            .collect()
    }

    fn filter_value(&self, field: ResourceField) -> Value {
        match field {
            ResourceField::CreatedTimestamp => Value::Timestamp(self.resource.created),
            ResourceField::ModifiedTimestamp => Value::Timestamp(self.resource.modified),
            field => Value::String(self.plain_value(field)),
        }
    }
}

fn strip_unsafe(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Binds every [ResourceField] by its variable name.
impl Activation for DecryptedResource {
    fn resolve(&self, name: &str) -> Option<Value> {
        ResourceField::from_variable(name).map(|field| self.filter_value(field))
    }
}

impl fmt::Debug for DecryptedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedResource")
            .field("id", &self.resource.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("uri", &self.uri)
            .field("password", &"********")
            .field("description", &"********")
            .field("ordinal", &self.ordinal)
            .finish()
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    id: &'a Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder_parent_id: Option<&'a Uuid>,
    name: &'a str,
    username: &'a str,
    uri: &'a str,
    password: &'a str,
    description: &'a str,
    created_timestamp: &'a DateTime<Utc>,
    modified_timestamp: &'a DateTime<Utc>,
}

/// Serializes to the flat shape used for `--json` output, with every field included.
impl Serialize for DecryptedResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        JsonOutput {
            id: &self.resource.id,
            folder_parent_id: self.resource.folder_parent_id.as_ref(),
            name: &self.name,
            username: &self.username,
            uri: &self.uri,
            password: &self.password,
            description: &self.description,
            created_timestamp: &self.resource.created,
            modified_timestamp: &self.resource.modified,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record() -> DecryptedResource {
        let created = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        DecryptedResource {
            resource: Resource {
                id: Uuid::parse_str("8d7a5f5e-3a8b-4b2f-9a4c-0f6c3a9d2e11").unwrap(),
                folder_parent_id: None,
                resource_type_id: Uuid::nil(),
                name: None,
                username: None,
                uri: None,
                description: None,
                metadata: None,
                secrets: Vec::new(),
                created,
                modified: created,
            },
            name: "Server A".to_string(),
            username: "root".to_string(),
            uri: "ssh://a.example.com".to_string(),
            password: Zeroizing::new("hunter2".to_string()),
            description: Zeroizing::new(String::new()),
            ordinal: 3,
        }
    }

    #[test]
    fn test_row() {
        assert_eq!(
            record().row(&[
                ResourceField::Name,
                ResourceField::FolderParentId,
                ResourceField::Password,
                ResourceField::CreatedTimestamp,
            ]),
            vec!["Server A", "", "hunter2", "2023-05-01T12:00:00Z"]
        );
    }

    #[test]
    fn test_row_strips_control_characters() {
        let mut record = record();
        record.name = "evil\x1b]0;pwned\x07\x1b[2J".to_string();
        record.description = Zeroizing::new("line one\nline two\u{9b}31m".to_string());

        assert_eq!(
            record.row(&[ResourceField::Name, ResourceField::Description]),
            vec!["evil]0;pwned[2J", "line oneline two31m"]
        );
        // Filters see the value as decrypted.
        assert_eq!(
            record.resolve("Name"),
            Some(Value::from("evil\x1b]0;pwned\x07\x1b[2J"))
        );
    }

    #[test]
    fn test_activation() {
        let record = record();
        assert_eq!(record.resolve("Name"), Some(Value::from("Server A")));
        assert_eq!(
            record.resolve("ID"),
            Some(Value::from("8d7a5f5e-3a8b-4b2f-9a4c-0f6c3a9d2e11"))
        );
        assert_eq!(
            record.resolve("ModifiedTimestamp"),
            Some(Value::Timestamp(record.resource.modified))
        );
        assert_eq!(record.resolve("name"), None);
    }

    #[test]
    fn test_json_output() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "8d7a5f5e-3a8b-4b2f-9a4c-0f6c3a9d2e11",
                "name": "Server A",
                "username": "root",
                "uri": "ssh://a.example.com",
                "password": "hunter2",
                "description": "",
                "created_timestamp": "2023-05-01T12:00:00Z",
                "modified_timestamp": "2023-05-01T12:00:00Z"
            })
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        assert!(!format!("{:?}", record()).contains("hunter2"));
    }
}
