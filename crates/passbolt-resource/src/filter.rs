use passbolt_filter::{CompileError, Environment, EvalError, Program};

use crate::{DecryptedResource, ResourceField};

/// The filter environment: every [ResourceField] bound by name.
pub fn resource_environment() -> Environment {
    ResourceField::ALL
        .into_iter()
        .fold(Environment::new(), |env, field| {
            env.with_variable(field.as_str(), field.filter_type())
        })
}

/// Whether `expression` references any of `fields`.
///
/// An empty expression references nothing. Malformed expressions, including references to
/// unknown fields, are errors.
pub fn references_any(expression: &str, fields: &[ResourceField]) -> Result<bool, CompileError> {
    passbolt_filter::references_any(
        expression,
        &resource_environment(),
        fields.iter().map(|field| field.as_str()),
    )
}

/// A compiled filter over [DecryptedResource]s.
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    program: Program,
}

impl ResourceFilter {
    /// Compile `expression` against the resource fields.
    pub fn compile(expression: &str) -> Result<Self, CompileError> {
        Ok(Self {
            program: Program::compile(expression, &resource_environment())?,
        })
    }

    #[allow(missing_docs)]
    pub fn expression(&self) -> &str {
        self.program.source()
    }

    /// Whether the filter reads any field that needs decryption.
    pub fn references_sensitive(&self) -> bool {
        self.references_any(&ResourceField::SENSITIVE)
    }

    #[allow(missing_docs)]
    pub fn references_any(&self, fields: &[ResourceField]) -> bool {
        self.program
            .references_any(fields.iter().map(|field| field.as_str()))
    }

    /// Evaluate the filter against one record.
    pub fn matches(&self, record: &DecryptedResource) -> Result<bool, EvalError> {
        self.program.evaluate(record)
    }
}
