use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::{Activation, EvalError, Type, Value};

/// Type checked expression tree, ready for evaluation.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Constant(Value),
    Variable {
        name: String,
        ty: Type,
    },
    List(Vec<Node>),
    Not(Box<Node>),
    Negate(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Equals {
        left: Box<Node>,
        right: Box<Node>,
        negated: bool,
    },
    Compare {
        left: Box<Node>,
        right: Box<Node>,
        op: CompareOp,
    },
    In {
        element: Box<Node>,
        list: Box<Node>,
    },
    Add(Box<Node>, Box<Node>),
    Subtract(Box<Node>, Box<Node>),
    Concat(Box<Node>, Box<Node>),
    Conditional {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },
    StringTest {
        target: Box<Node>,
        argument: Box<Node>,
        op: StringOp,
    },
    Matches {
        target: Box<Node>,
        pattern: Pattern,
    },
    LowerAscii(Box<Node>),
    UpperAscii(Box<Node>),
    Size(Box<Node>),
    Timestamp(Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl StringOp {
    fn test(self, target: &str, argument: &str) -> bool {
        match self {
            StringOp::Contains => target.contains(argument),
            StringOp::StartsWith => target.starts_with(argument),
            StringOp::EndsWith => target.ends_with(argument),
        }
    }
}

/// Regular expression argument of `matches`. Constant patterns are compiled up front.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    Compiled(Regex),
    Dynamic(Box<Node>),
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}

impl Node {
    pub(crate) fn eval(&self, activation: &dyn Activation) -> Result<Value, EvalError> {
        Ok(match self {
            Node::Constant(value) => value.clone(),
            Node::Variable { name, ty } => {
                let value = activation
                    .resolve(name)
                    .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?;
                if !value.has_type(ty) {
                    return Err(EvalError::BindingType {
                        name: name.clone(),
                        expected: ty.clone(),
                        found: value.kind(),
                    });
                }
                value
            }
            Node::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| item.eval(activation))
                    .collect::<Result<_, _>>()?,
            ),
            Node::Not(operand) => Value::Bool(!operand.eval_bool(activation)?),
            Node::Negate(operand) => Value::Int(
                operand
                    .eval_int(activation)?
                    .checked_neg()
                    .ok_or(EvalError::Overflow)?,
            ),
            // Both connectives short-circuit left to right.
            Node::And(left, right) => {
                Value::Bool(left.eval_bool(activation)? && right.eval_bool(activation)?)
            }
            Node::Or(left, right) => {
                Value::Bool(left.eval_bool(activation)? || right.eval_bool(activation)?)
            }
            Node::Equals {
                left,
                right,
                negated,
            } => {
                let equal = left.eval(activation)? == right.eval(activation)?;
                Value::Bool(equal != *negated)
            }
            Node::Compare { left, right, op } => {
                let ordering = compare(&left.eval(activation)?, &right.eval(activation)?)?;
                Value::Bool(op.accepts(ordering))
            }
            Node::In { element, list } => {
                let element = element.eval(activation)?;
                match list.eval(activation)? {
                    Value::List(items) => Value::Bool(items.contains(&element)),
                    other => return Err(operand_type("list", &other)),
                }
            }
            Node::Add(left, right) => Value::Int(
                left.eval_int(activation)?
                    .checked_add(right.eval_int(activation)?)
                    .ok_or(EvalError::Overflow)?,
            ),
            Node::Subtract(left, right) => Value::Int(
                left.eval_int(activation)?
                    .checked_sub(right.eval_int(activation)?)
                    .ok_or(EvalError::Overflow)?,
            ),
            Node::Concat(left, right) => {
                let mut joined = left.eval_string(activation)?;
                joined.push_str(&right.eval_string(activation)?);
                Value::String(joined)
            }
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if condition.eval_bool(activation)? {
                    then_branch.eval(activation)?
                } else {
                    else_branch.eval(activation)?
                }
            }
            Node::StringTest {
                target,
                argument,
                op,
            } => {
                let target = target.eval_string(activation)?;
                let argument = argument.eval_string(activation)?;
                Value::Bool(op.test(&target, &argument))
            }
            Node::Matches { target, pattern } => {
                let target = target.eval_string(activation)?;
                let matched = match pattern {
                    Pattern::Compiled(regex) => regex.is_match(&target),
                    Pattern::Dynamic(pattern) => {
                        let pattern = pattern.eval_string(activation)?;
                        Regex::new(&pattern)
                            .map_err(|e| EvalError::InvalidRegex(e.to_string()))?
                            .is_match(&target)
                    }
                };
                Value::Bool(matched)
            }
            Node::LowerAscii(operand) => {
                Value::String(operand.eval_string(activation)?.to_ascii_lowercase())
            }
            Node::UpperAscii(operand) => {
                Value::String(operand.eval_string(activation)?.to_ascii_uppercase())
            }
            Node::Size(operand) => {
                let size = match operand.eval(activation)? {
                    Value::String(s) => s.chars().count(),
                    Value::List(items) => items.len(),
                    other => return Err(operand_type("string or list", &other)),
                };
                Value::Int(i64::try_from(size).map_err(|_| EvalError::Overflow)?)
            }
            Node::Timestamp(operand) => {
                let value = operand.eval_string(activation)?;
                let ts = parse_timestamp(&value).map_err(|e| EvalError::InvalidTimestamp {
                    value: value.clone(),
                    message: e.to_string(),
                })?;
                Value::Timestamp(ts)
            }
        })
    }

    pub(crate) fn eval_bool(&self, activation: &dyn Activation) -> Result<bool, EvalError> {
        match self.eval(activation)? {
            Value::Bool(b) => Ok(b),
            other => Err(operand_type("bool", &other)),
        }
    }

    fn eval_int(&self, activation: &dyn Activation) -> Result<i64, EvalError> {
        match self.eval(activation)? {
            Value::Int(i) => Ok(i),
            other => Err(operand_type("int", &other)),
        }
    }

    fn eval_string(&self, activation: &dyn Activation) -> Result<String, EvalError> {
        match self.eval(activation)? {
            Value::String(s) => Ok(s),
            other => Err(operand_type("string", &other)),
        }
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
        (left, _) => Err(operand_type("int, string or timestamp", left)),
    }
}

fn operand_type(expected: &'static str, found: &Value) -> EvalError {
    EvalError::OperandType {
        expected,
        found: found.kind(),
    }
}
