#![doc = include_str!("../README.md")]

mod ast;
mod check;
mod env;
mod error;
mod eval;
mod lexer;
mod parser;
mod program;
mod value;

pub use env::Environment;
pub use error::{CompileError, EvalError};
pub use program::{references_any, Program};
pub use value::{Activation, Type, Value};
