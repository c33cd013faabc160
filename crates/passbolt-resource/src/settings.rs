use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::MAX_DECRYPTION_WORKERS;

/// Settings for [ResourceLister](crate::ResourceLister).
///
/// Defaults to
///
/// ```
/// # use std::time::Duration;
/// # use passbolt_resource::ListSettings;
/// let settings = ListSettings {
///     timeout: Duration::from_secs(60),
///     max_workers: 16,
/// };
/// assert_eq!(settings, ListSettings::default());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ListSettings {
    /// Deadline for the whole listing, fetch through filter. Serialized in seconds.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Upper bound on concurrent decryption workers. The pool never grows past the number of
    /// available cores.
    pub max_workers: usize,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_workers: MAX_DECRYPTION_WORKERS,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: ListSettings = serde_json::from_str(r#"{ "timeout": 5 }"#).unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.max_workers, MAX_DECRYPTION_WORKERS);
    }

    #[test]
    fn test_camel_case() {
        let settings: ListSettings = serde_json::from_str(r#"{ "maxWorkers": 2 }"#).unwrap();
        assert_eq!(settings.max_workers, 2);
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            serde_json::json!({ "timeout": 60, "maxWorkers": 2 })
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<ListSettings>(r#"{ "workers": 2 }"#).is_err());
    }
}
