use thiserror::Error;

use crate::token::Span;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("syntax error at {span:?}: {message}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("syntax error at {span:?}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }
}
