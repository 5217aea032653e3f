//! Lexer, parser, and untyped AST for the TinyQuery SQL dialect.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

use error::{LexError, ParseError};

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Lexes then parses `text` into an untyped [`ast::Select`].
pub fn parse_query(text: &str) -> Result<ast::Select, SyntaxError> {
    let tokens = lexer::lex(text)?;
    let select = parser::parse(&tokens)?;
    Ok(select)
}
