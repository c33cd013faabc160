use std::{fmt, str::FromStr};

use passbolt_filter::Type;
use thiserror::Error;

/// A field of a listed resource, usable both as an output column and as a filter variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ResourceField {
    Id,
    FolderParentId,
    Name,
    Username,
    Uri,
    Password,
    Description,
    CreatedTimestamp,
    ModifiedTimestamp,
}

/// Returned when a column name does not match any [ResourceField].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown column: {0}")]
pub struct UnknownColumnError(pub String);

impl ResourceField {
    /// Every field, in display order.
    pub const ALL: [ResourceField; 9] = [
        Self::Id,
        Self::FolderParentId,
        Self::Name,
        Self::Username,
        Self::Uri,
        Self::Password,
        Self::Description,
        Self::CreatedTimestamp,
        Self::ModifiedTimestamp,
    ];

    /// Fields that may only be known after decrypting the resource.
    pub const SENSITIVE: [ResourceField; 5] = [
        Self::Name,
        Self::Username,
        Self::Uri,
        Self::Password,
        Self::Description,
    ];

    /// Columns shown when the caller does not pick any.
    pub const DEFAULT_COLUMNS: [ResourceField; 5] = [
        Self::Id,
        Self::FolderParentId,
        Self::Name,
        Self::Username,
        Self::Uri,
    ];

    /// The variable name used in filters and the column header.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::FolderParentId => "FolderParentID",
            Self::Name => "Name",
            Self::Username => "Username",
            Self::Uri => "URI",
            Self::Password => "Password",
            Self::Description => "Description",
            Self::CreatedTimestamp => "CreatedTimestamp",
            Self::ModifiedTimestamp => "ModifiedTimestamp",
        }
    }

    /// Look up a field by its exact filter variable name.
    pub fn from_variable(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    #[allow(missing_docs)]
    pub fn is_sensitive(self) -> bool {
        Self::SENSITIVE.contains(&self)
    }

    /// The type the field is bound as in filter expressions.
    pub fn filter_type(self) -> Type {
        match self {
            Self::CreatedTimestamp | Self::ModifiedTimestamp => Type::Timestamp,
            _ => Type::String,
        }
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column names are matched case-insensitively, so `uri`, `URI` and `Uri` are the same column.
impl FromStr for ResourceField {
    type Err = UnknownColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownColumnError(s.to_owned()))
    }
}

/// Parse a list of column names, such as the values of a repeated `--column` flag.
pub fn parse_columns<I, S>(names: I) -> Result<Vec<ResourceField>, UnknownColumnError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|name| name.as_ref().parse()).collect()
}
