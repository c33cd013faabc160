use std::{fmt, iter::Peekable, str::CharIndices};

use crate::CompileError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Ident(String),
    /// Unsigned magnitude, the parser applies a leading minus and range checks.
    Int(u64),
    Str(String),
    True,
    False,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Int(value) => write!(f, "integer {value}"),
            Token::Str(_) => f.write_str("string literal"),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::In => f.write_str("'in'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
            Token::Dot => f.write_str("'.'"),
            Token::Question => f.write_str("'?'"),
            Token::Colon => f.write_str("':'"),
            Token::Not => f.write_str("'!'"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Eq => f.write_str("'=='"),
            Token::Ne => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::Le => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::Ge => f.write_str("'>='"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Eof => f.write_str("end of expression"),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split `source` into tokens. The result always ends with [Token::Eof].
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut chars = source.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            '[' => single(&mut chars, Token::LBracket),
            ']' => single(&mut chars, Token::RBracket),
            ',' => single(&mut chars, Token::Comma),
            '.' => single(&mut chars, Token::Dot),
            '?' => single(&mut chars, Token::Question),
            ':' => single(&mut chars, Token::Colon),
            '+' => single(&mut chars, Token::Plus),
            '-' => single(&mut chars, Token::Minus),
            '!' => pair(&mut chars, '=', Token::Ne, Token::Not),
            '<' => pair(&mut chars, '=', Token::Le, Token::Lt),
            '>' => pair(&mut chars, '=', Token::Ge, Token::Gt),
            '=' => doubled(&mut chars, offset, '=', Token::Eq)?,
            '&' => doubled(&mut chars, offset, '&', Token::And)?,
            '|' => doubled(&mut chars, offset, '|', Token::Or)?,
            '"' | '\'' => Token::Str(string_literal(&mut chars, offset)?),
            c if c.is_ascii_digit() => integer_literal(&mut chars, offset)?,
            c if c.is_ascii_alphabetic() || c == '_' => identifier(&mut chars),
            found => return Err(CompileError::UnexpectedCharacter { found, offset }),
        };

        tokens.push(Spanned { token, offset });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

type Chars<'a> = Peekable<CharIndices<'a>>;

fn single(chars: &mut Chars<'_>, token: Token) -> Token {
    chars.next();
    token
}

/// Lex a one or two character operator, such as `<` and `<=`.
fn pair(chars: &mut Chars<'_>, second: char, long: Token, short: Token) -> Token {
    chars.next();
    if chars.next_if(|&(_, c)| c == second).is_some() {
        long
    } else {
        short
    }
}

/// Lex an operator that is only valid when its character is doubled, such as `&&`.
fn doubled(
    chars: &mut Chars<'_>,
    offset: usize,
    c: char,
    token: Token,
) -> Result<Token, CompileError> {
    chars.next();
    match chars.next_if(|&(_, next)| next == c) {
        Some(_) => Ok(token),
        None => Err(CompileError::UnexpectedCharacter { found: c, offset }),
    }
}

fn string_literal(chars: &mut Chars<'_>, offset: usize) -> Result<String, CompileError> {
    let Some((_, quote)) = chars.next() else {
        return Err(CompileError::UnterminatedString { offset });
    };

    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(CompileError::UnterminatedString { offset }),
            Some((_, c)) if c == quote => return Ok(value),
            Some((escape_offset, '\\')) => {
                let escaped = match chars.next() {
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((_, '0')) => '\0',
                    Some((_, c @ ('\\' | '"' | '\''))) => c,
                    Some(_) => {
                        return Err(CompileError::InvalidEscape {
                            offset: escape_offset,
                        })
                    }
                    None => return Err(CompileError::UnterminatedString { offset }),
                };
                value.push(escaped);
            }
            Some((_, c)) => value.push(c),
        }
    }
}

fn integer_literal(chars: &mut Chars<'_>, offset: usize) -> Result<Token, CompileError> {
    let mut digits = String::new();
    while let Some((_, c)) = chars.next_if(|&(_, c)| c.is_ascii_digit()) {
        digits.push(c);
    }

    digits
        .parse()
        .map(Token::Int)
        .map_err(|_| CompileError::IntegerOutOfRange { offset })
}

fn identifier(chars: &mut Chars<'_>) -> Token {
    let mut name = String::new();
    while let Some((_, c)) = chars.next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_') {
        name.push(c);
    }

    match name.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        "in" => Token::In,
        _ => Token::Ident(name),
    }
}
