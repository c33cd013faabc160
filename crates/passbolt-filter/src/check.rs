use std::collections::BTreeSet;

use regex::Regex;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, UnaryOp},
    eval::{parse_timestamp, CompareOp, Node, Pattern, StringOp},
    CompileError, Environment, Type, Value,
};

/// Type checks a parsed expression against an [Environment], lowering it into an evaluable
/// [Node] and recording every variable it references.
pub(crate) struct Checker<'a> {
    env: &'a Environment,
    pub(crate) references: BTreeSet<String>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(env: &'a Environment) -> Self {
        Self {
            env,
            references: BTreeSet::new(),
        }
    }

    pub(crate) fn check(&mut self, expr: &Expr) -> Result<(Node, Type), CompileError> {
        match &expr.kind {
            ExprKind::Bool(b) => Ok((Node::Constant(Value::Bool(*b)), Type::Bool)),
            ExprKind::Int(i) => Ok((Node::Constant(Value::Int(*i)), Type::Int)),
            ExprKind::Str(s) => Ok((Node::Constant(Value::String(s.clone())), Type::String)),
            ExprKind::Ident(name) => {
                let ty = self.env.variable(name).cloned().ok_or_else(|| {
                    CompileError::UndeclaredReference {
                        name: name.clone(),
                        offset: expr.offset,
                    }
                })?;
                self.references.insert(name.clone());
                Ok((
                    Node::Variable {
                        name: name.clone(),
                        ty: ty.clone(),
                    },
                    ty,
                ))
            }
            ExprKind::List(items) => self.list(items, expr.offset),
            ExprKind::Unary { op, operand } => self.unary(*op, operand, expr.offset),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, expr.offset),
            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let (condition, condition_ty) = self.check(condition)?;
                let (then_node, then_ty) = self.check(then_branch)?;
                let (else_node, else_ty) = self.check(else_branch)?;
                if condition_ty != Type::Bool || then_ty != else_ty {
                    return Err(no_overload(
                        "_?_:_",
                        &[condition_ty, then_ty, else_ty],
                        expr.offset,
                    ));
                }
                Ok((
                    Node::Conditional {
                        condition: Box::new(condition),
                        then_branch: Box::new(then_node),
                        else_branch: Box::new(else_node),
                    },
                    then_ty,
                ))
            }
            ExprKind::Call {
                function,
                target,
                args,
            } => self.call(function, target.as_deref(), args, expr.offset),
        }
    }

    fn list(&mut self, items: &[Expr], offset: usize) -> Result<(Node, Type), CompileError> {
        let mut nodes = Vec::with_capacity(items.len());
        let mut element_ty: Option<Type> = None;

        for item in items {
            let (node, ty) = self.check(item)?;
            match &element_ty {
                Some(expected) if *expected != ty => {
                    return Err(no_overload("list", &[expected.clone(), ty], item.offset));
                }
                Some(_) => {}
                None => element_ty = Some(ty),
            }
            nodes.push(node);
        }

        let element_ty = element_ty.ok_or(CompileError::EmptyList { offset })?;
        Ok((Node::List(nodes), Type::List(Box::new(element_ty))))
    }

    fn unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        offset: usize,
    ) -> Result<(Node, Type), CompileError> {
        let (node, ty) = self.check(operand)?;
        match (op, &ty) {
            (UnaryOp::Not, Type::Bool) => Ok((Node::Not(Box::new(node)), Type::Bool)),
            // Fold negative literals so `-9223372036854775807` stays a constant.
            (UnaryOp::Negate, Type::Int) => match node {
                Node::Constant(Value::Int(i)) => {
                    let negated = i
                        .checked_neg()
                        .ok_or(CompileError::IntegerOutOfRange { offset })?;
                    Ok((Node::Constant(Value::Int(negated)), Type::Int))
                }
                node => Ok((Node::Negate(Box::new(node)), Type::Int)),
            },
            (UnaryOp::Not, _) => Err(no_overload("!_", &[ty.clone()], offset)),
            (UnaryOp::Negate, _) => Err(no_overload("-_", &[ty.clone()], offset)),
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        offset: usize,
    ) -> Result<(Node, Type), CompileError> {
        let (left, left_ty) = self.check(left)?;
        let (right, right_ty) = self.check(right)?;
        let (l, r) = (Box::new(left), Box::new(right));

        let checked = match op {
            BinaryOp::And if left_ty == Type::Bool && right_ty == Type::Bool => {
                Some((Node::And(l, r), Type::Bool))
            }
            BinaryOp::Or if left_ty == Type::Bool && right_ty == Type::Bool => {
                Some((Node::Or(l, r), Type::Bool))
            }
            BinaryOp::Eq | BinaryOp::Ne if left_ty == right_ty => Some((
                Node::Equals {
                    left: l,
                    right: r,
                    negated: op == BinaryOp::Ne,
                },
                Type::Bool,
            )),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
                if left_ty == right_ty && left_ty.is_ordered() =>
            {
                let op = match op {
                    BinaryOp::Lt => CompareOp::Lt,
                    BinaryOp::Le => CompareOp::Le,
                    BinaryOp::Gt => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                Some((
                    Node::Compare {
                        left: l,
                        right: r,
                        op,
                    },
                    Type::Bool,
                ))
            }
            BinaryOp::In => match &right_ty {
                Type::List(element) if **element == left_ty => Some((
                    Node::In {
                        element: l,
                        list: r,
                    },
                    Type::Bool,
                )),
                _ => None,
            },
            BinaryOp::Add if left_ty == Type::Int && right_ty == Type::Int => {
                Some((Node::Add(l, r), Type::Int))
            }
            BinaryOp::Add if left_ty == Type::String && right_ty == Type::String => {
                Some((Node::Concat(l, r), Type::String))
            }
            BinaryOp::Sub if left_ty == Type::Int && right_ty == Type::Int => {
                Some((Node::Subtract(l, r), Type::Int))
            }
            _ => None,
        };

        checked.ok_or_else(|| {
            no_overload(&format!("_{}_", op.symbol()), &[left_ty, right_ty], offset)
        })
    }

    fn call(
        &mut self,
        function: &str,
        target: Option<&Expr>,
        args: &[Expr],
        offset: usize,
    ) -> Result<(Node, Type), CompileError> {
        // A member call is checked as a global call with the target as its first operand. The
        // `is_member` flag decides which spellings each function accepts.
        let mut operands = Vec::with_capacity(args.len() + 1);
        if let Some(target) = target {
            operands.push(self.check(target)?);
        }
        for arg in args {
            operands.push(self.check(arg)?);
        }
        let is_member = target.is_some();
        let boxed = |node: &Node| Box::new(node.clone());

        let string_test =
            |op: StringOp, target: &Node, argument: &Node| -> Result<(Node, Type), CompileError> {
                Ok((
                    Node::StringTest {
                        target: boxed(target),
                        argument: boxed(argument),
                        op,
                    },
                    Type::Bool,
                ))
            };

        match (function, is_member, operands.as_slice()) {
            ("contains", true, [(target, Type::String), (argument, Type::String)]) => {
                string_test(StringOp::Contains, target, argument)
            }
            ("startsWith", true, [(target, Type::String), (argument, Type::String)]) => {
                string_test(StringOp::StartsWith, target, argument)
            }
            ("endsWith", true, [(target, Type::String), (argument, Type::String)]) => {
                string_test(StringOp::EndsWith, target, argument)
            }
            ("matches", _, [(target, Type::String), (pattern, Type::String)]) => {
                let pattern = match pattern {
                    Node::Constant(Value::String(pattern)) => {
                        Pattern::Compiled(Regex::new(pattern).map_err(|e| {
                            CompileError::InvalidRegex {
                                offset,
                                message: e.to_string(),
                            }
                        })?)
                    }
                    dynamic => Pattern::Dynamic(boxed(dynamic)),
                };
                Ok((
                    Node::Matches {
                        target: boxed(target),
                        pattern,
                    },
                    Type::Bool,
                ))
            }
            ("lowerAscii", true, [(target, Type::String)]) => {
                Ok((Node::LowerAscii(boxed(target)), Type::String))
            }
            ("upperAscii", true, [(target, Type::String)]) => {
                Ok((Node::UpperAscii(boxed(target)), Type::String))
            }
            ("size", _, [(operand, Type::String | Type::List(_))]) => {
                Ok((Node::Size(boxed(operand)), Type::Int))
            }
            ("timestamp", false, [(operand, Type::String)]) => match operand {
                Node::Constant(Value::String(value)) => {
                    let ts = parse_timestamp(value).map_err(|e| {
                        CompileError::InvalidTimestamp {
                            offset,
                            message: e.to_string(),
                        }
                    })?;
                    Ok((Node::Constant(Value::Timestamp(ts)), Type::Timestamp))
                }
                dynamic => Ok((Node::Timestamp(boxed(dynamic)), Type::Timestamp)),
            },
            (
                "contains" | "startsWith" | "endsWith" | "matches" | "lowerAscii" | "upperAscii"
                | "size" | "timestamp",
                _,
                _,
            ) => {
                let types: Vec<Type> = operands.iter().map(|(_, ty)| ty.clone()).collect();
                Err(no_overload(function, &types, offset))
            }
            _ => Err(CompileError::UnknownFunction {
                name: function.to_owned(),
                offset,
            }),
        }
    }
}

fn no_overload(function: &str, types: &[Type], offset: usize) -> CompileError {
    CompileError::NoMatchingOverload {
        function: function.to_owned(),
        arguments: types
            .iter()
            .map(|ty| ty.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        offset,
    }
}
