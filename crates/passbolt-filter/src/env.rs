use std::collections::HashMap;

use crate::Type;

/// The set of variables an expression may reference, together with their declared types.
///
/// ```
/// # use passbolt_filter::{Environment, Type};
/// let env = Environment::new()
///     .with_variable("Name", Type::String)
///     .with_variable("CreatedTimestamp", Type::Timestamp);
/// assert_eq!(env.variable("Name"), Some(&Type::String));
/// assert_eq!(env.variable("name"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: HashMap<String, Type>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Redeclaring a name replaces its type.
    pub fn with_variable(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.variables.insert(name.into(), ty);
        self
    }

    /// Declared type of `name`. Names are case sensitive.
    pub fn variable(&self, name: &str) -> Option<&Type> {
        self.variables.get(name)
    }
}
