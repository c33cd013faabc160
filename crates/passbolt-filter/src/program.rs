use std::collections::BTreeSet;

use crate::{
    check::Checker, eval::Node, parser::parse, Activation, CompileError, Environment, EvalError,
    Type,
};

/// A compiled, type checked boolean expression.
///
/// Compiling is the expensive step: parse errors, undeclared references, type errors and
/// malformed constant regular expressions or timestamps are all reported here. A compiled
/// program is immutable and can be evaluated any number of times, from any thread.
///
/// ```
/// # use std::collections::HashMap;
/// # use passbolt_filter::{Environment, Program, Type, Value};
/// let env = Environment::new().with_variable("Name", Type::String);
/// let program = Program::compile(r#"Name.startsWith("Server")"#, &env).unwrap();
///
/// let bindings = HashMap::from([("Name", Value::from("Server A"))]);
/// assert!(program.evaluate(&bindings).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    root: Node,
    references: BTreeSet<String>,
}

impl Program {
    /// Compile `source` against the variables declared in `env`.
    pub fn compile(source: &str, env: &Environment) -> Result<Self, CompileError> {
        let expr = parse(source)?;

        let mut checker = Checker::new(env);
        let (root, ty) = checker.check(&expr)?;
        if ty != Type::Bool {
            return Err(CompileError::NotBoolean { found: ty });
        }

        Ok(Self {
            source: source.to_owned(),
            root,
            references: checker.references,
        })
    }

    /// The source text this program was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of all variables the expression references, in sorted order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(String::as_str)
    }

    /// Whether the expression references at least one of `candidates`.
    ///
    /// This inspects the compiled references, so a name that only appears inside a string
    /// literal or as part of a longer identifier does not count.
    pub fn references_any<I, S>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .any(|candidate| self.references.contains(candidate.as_ref()))
    }

    /// Evaluate the expression against `activation`.
    pub fn evaluate(&self, activation: &dyn Activation) -> Result<bool, EvalError> {
        self.root.eval_bool(activation)
    }
}

/// Compile `source` and report whether it references any of `candidates`.
///
/// Empty or whitespace-only source never references anything.
pub fn references_any<I, S>(
    source: &str,
    env: &Environment,
    candidates: I,
) -> Result<bool, CompileError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if source.trim().is_empty() {
        return Ok(false);
    }
    Ok(Program::compile(source, env)?.references_any(candidates))
}
