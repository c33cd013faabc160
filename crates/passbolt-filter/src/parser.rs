use crate::{
    ast::{BinaryOp, Expr, ExprKind, UnaryOp},
    lexer::{tokenize, Spanned, Token},
    CompileError,
};

/// Deepest expression tree, and deepest parser recursion, a filter may produce.
pub(crate) const MAX_NESTING: usize = 250;

/// Parse `source` into an expression tree.
///
/// Precedence, lowest first: `?:`, `||`, `&&`, relations (`==`, `!=`, `<`, `<=`, `>`, `>=`,
/// `in`), `+`/`-`, unary `!`/`-`, member calls.
pub(crate) fn parse(source: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(source)?;
    if tokens.len() == 1 {
        return Err(CompileError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let expr = parser.expression()?;
    parser.expect(Token::Eof, "end of expression")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> &Spanned {
        // `tokenize` always terminates the stream with Eof, and we never advance past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, distance: usize) -> &Token {
        &self.tokens[(self.pos + distance).min(self.tokens.len() - 1)].token
    }

    fn advance(&mut self) -> Spanned {
        let current = self.peek().clone();
        if current.token != Token::Eof {
            self.pos += 1;
        }
        current
    }

    fn eat(&mut self, token: &Token) -> bool {
        if &self.peek().token == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<Spanned, CompileError> {
        if self.peek().token == token {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> CompileError {
        let current = self.peek();
        CompileError::UnexpectedToken {
            found: current.token.to_string(),
            expected,
            offset: current.offset,
        }
    }

    /// Build a node, rejecting trees deeper than [`MAX_NESTING`].
    fn node(&self, kind: ExprKind, offset: usize) -> Result<Expr, CompileError> {
        let expr = Expr::new(kind, offset);
        if expr.depth > MAX_NESTING {
            return Err(nesting_too_deep(offset));
        }
        Ok(expr)
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: Expr,
        right: Expr,
        offset: usize,
    ) -> Result<Expr, CompileError> {
        self.node(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            offset,
        )
    }

    /// Run `parse` one recursion level deeper, failing before the stack can run out.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Expr, CompileError>,
    ) -> Result<Expr, CompileError> {
        if self.nesting >= MAX_NESTING {
            return Err(nesting_too_deep(self.peek().offset));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn expression(&mut self) -> Result<Expr, CompileError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, CompileError> {
        let condition = self.or()?;
        let offset = self.peek().offset;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }

        let then_branch = self.or()?;
        self.expect(Token::Colon, "':'")?;
        let else_branch = self.expression()?;

        self.node(
            ExprKind::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            offset,
        )
    }

    fn or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.and()?;
        loop {
            let offset = self.peek().offset;
            if !self.eat(&Token::Or) {
                return Ok(left);
            }
            let right = self.and()?;
            left = self.binary(BinaryOp::Or, left, right, offset)?;
        }
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.relation()?;
        loop {
            let offset = self.peek().offset;
            if !self.eat(&Token::And) {
                return Ok(left);
            }
            let right = self.relation()?;
            left = self.binary(BinaryOp::And, left, right, offset)?;
        }
    }

    fn relation(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.additive()?;
        loop {
            let Spanned { token, offset } = self.peek().clone();
            let op = match token {
                Token::Eq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                Token::In => BinaryOp::In,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = self.binary(op, left, right, offset)?;
        }
    }

    fn additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.unary()?;
        loop {
            let Spanned { token, offset } = self.peek().clone();
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = self.binary(op, left, right, offset)?;
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let Spanned { token, offset } = self.peek().clone();
        let op = match token {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            _ => return self.member(),
        };
        self.advance();
        if op == UnaryOp::Negate {
            if let Some(literal) = self.negative_literal()? {
                return Ok(literal);
            }
        }
        let operand = self.nested(Self::unary)?;

        self.node(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            offset,
        )
    }

    /// Fold `-` directly followed by an integer literal, so `-9223372036854775808` is
    /// representable. A literal that is the target of a method call is left alone.
    fn negative_literal(&mut self) -> Result<Option<Expr>, CompileError> {
        let Token::Int(magnitude) = *self.peek_ahead(0) else {
            return Ok(None);
        };
        if *self.peek_ahead(1) == Token::Dot {
            return Ok(None);
        }

        let offset = self.advance().offset;
        let value = 0_i64
            .checked_sub_unsigned(magnitude)
            .ok_or(CompileError::IntegerOutOfRange { offset })?;
        Ok(Some(Expr::new(ExprKind::Int(value), offset)))
    }

    fn member(&mut self) -> Result<Expr, CompileError> {
        let mut target = self.primary()?;
        while self.eat(&Token::Dot) {
            let Spanned { token, offset } = self.advance();
            let Token::Ident(function) = token else {
                return Err(CompileError::UnexpectedToken {
                    found: token.to_string(),
                    expected: "method name",
                    offset,
                });
            };
            // Field selection is not supported, every member access must be a call.
            self.expect(Token::LParen, "'('")?;
            let args = self.arguments()?;

            target = self.node(
                ExprKind::Call {
                    function,
                    target: Some(Box::new(target)),
                    args,
                },
                offset,
            )?;
        }
        Ok(target)
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let Spanned { token, offset } = self.peek().clone();
        let kind = match token {
            Token::True => ExprKind::Bool(true),
            Token::False => ExprKind::Bool(false),
            Token::Int(magnitude) => ExprKind::Int(
                i64::try_from(magnitude)
                    .map_err(|_| CompileError::IntegerOutOfRange { offset })?,
            ),
            Token::Str(value) => ExprKind::Str(value),
            Token::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                let items = self.list_items()?;
                return self.node(ExprKind::List(items), offset);
            }
            Token::Ident(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.arguments()?;
                    return self.node(
                        ExprKind::Call {
                            function: name,
                            target: None,
                            args,
                        },
                        offset,
                    );
                }
                return Ok(Expr::new(ExprKind::Ident(name), offset));
            }
            _ => return Err(self.unexpected("an operand")),
        };
        self.advance();
        Ok(Expr::new(kind, offset))
    }

    /// Parse call arguments after the opening parenthesis, consuming the closing one.
    fn arguments(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.comma_separated(Token::RParen, "',' or ')'")
    }

    /// Parse list items after the opening bracket, consuming the closing one.
    fn list_items(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.comma_separated(Token::RBracket, "',' or ']'")
    }

    fn comma_separated(
        &mut self,
        close: Token,
        expected: &'static str,
    ) -> Result<Vec<Expr>, CompileError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&close) {
                return Ok(items);
            }
            if !self.eat(&Token::Comma) {
                return Err(self.unexpected(expected));
            }
        }
    }
}

fn nesting_too_deep(offset: usize) -> CompileError {
    CompileError::NestingTooDeep {
        limit: MAX_NESTING,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

fn binary(op: BinaryOp, left: Expr, right: Expr, offset: usize) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        offset,
    )
}

    fn ident(name: &str, offset: usize) -> Expr {
        Expr::new(ExprKind::Ident(name.to_string()), offset)
    }

    fn string(value: &str, offset: usize) -> Expr {
        Expr::new(ExprKind::Str(value.to_string()), offset)
    }

    #[test]
    fn test_parse_equality() {
        assert_eq!(
            parse(r#"ID == "x""#).unwrap(),
            binary(BinaryOp::Eq, ident("ID", 0), string("x", 6), 3)
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a || b && c").unwrap();
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = parse("(a || b) && c").unwrap();
        assert!(matches!(
            expr.kind,
            ExprKind::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_method_chain() {
        let expr = parse(r#"URI.lowerAscii().startsWith("https://")"#).unwrap();
        let ExprKind::Call {
            function, target, ..
        } = expr.kind
        else {
            panic!("expected call");
        };
        assert_eq!(function, "startsWith");
        let target = target.unwrap();
        assert!(matches!(
            target.kind,
            ExprKind::Call { ref function, .. } if function == "lowerAscii"
        ));
    }

    #[test]
    fn test_parse_global_call_and_list() {
        let expr = parse(r#"matches(Name, "^a") || Name in ["x", "y"]"#).unwrap();
        let ExprKind::Binary { left, right, .. } = expr.kind else {
            panic!("expected binary expression");
        };
        assert!(matches!(
            left.kind,
            ExprKind::Call { target: None, ref args, .. } if args.len() == 2
        ));
        assert!(matches!(
            right.kind,
            ExprKind::Binary { op: BinaryOp::In, ref right, .. }
                if matches!(right.kind, ExprKind::List(ref items) if items.len() == 2)
        ));
    }

    #[test]
    fn test_parse_conditional() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        let ExprKind::Conditional { else_branch, .. } = expr.kind else {
            panic!("expected conditional");
        };
        assert!(matches!(else_branch.kind, ExprKind::Conditional { .. }));
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(parse("   "), Err(CompileError::Empty));
    }

    #[test]
    fn test_trailing_tokens() {
        assert_eq!(
            parse("a b"),
            Err(CompileError::UnexpectedToken {
                found: "identifier 'b'".to_string(),
                expected: "end of expression",
                offset: 2,
            })
        );
    }

    #[test]
    fn test_missing_operand() {
        assert_eq!(
            parse("a &&"),
            Err(CompileError::UnexpectedToken {
                found: "end of expression".to_string(),
                expected: "an operand",
                offset: 4,
            })
        );
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let source = format!("{}Name == \"x\"{}", "(".repeat(5_000), ")".repeat(5_000));
        assert!(matches!(
            parse(&source),
            Err(CompileError::NestingTooDeep {
                limit: MAX_NESTING,
                ..
            })
        ));
    }

    #[test]
    fn test_deep_unary_chain_is_rejected() {
        let source = format!("{}true", "!".repeat(200_000));
        assert!(matches!(
            parse(&source),
            Err(CompileError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        let source = vec!["a"; 5_000].join(" || ");
        assert!(matches!(
            parse(&source),
            Err(CompileError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_nesting_within_limit() {
        let source = format!("{}a{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse(&source).unwrap(), ident("a", 100));
        assert_eq!(parse(&vec!["a"; 100].join(" || ")).unwrap().depth, 100);
    }

    #[test]
    fn test_negative_literal_is_folded() {
        assert_eq!(
            parse("-9223372036854775808").unwrap(),
            Expr::new(ExprKind::Int(i64::MIN), 1)
        );
        assert_eq!(
            parse("9223372036854775808"),
            Err(CompileError::IntegerOutOfRange { offset: 0 })
        );
        assert_eq!(
            parse("-9223372036854775809"),
            Err(CompileError::IntegerOutOfRange { offset: 1 })
        );
    }

    #[test]
    fn test_negated_method_target_is_not_folded() {
        let expr = parse("-5.size()").unwrap();
        assert!(matches!(
            expr.kind,
            ExprKind::Unary {
                op: UnaryOp::Negate,
                ..
            }
        ));
    }

    #[test]
    fn test_field_selection_is_rejected() {
        assert!(matches!(
            parse("Name.length"),
            Err(CompileError::UnexpectedToken { expected: "'('", .. })
        ));
    }

    #[test]
    fn test_unclosed_call() {
        assert!(matches!(
            parse("size(Name"),
            Err(CompileError::UnexpectedToken {
                expected: "',' or ')'",
                ..
            })
        ));
    }
}
