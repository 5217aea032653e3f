use crate::error::LexError;
use crate::token::{reserved_word, Span, Token, TokenKind};

/// Minimal char-scanning cursor, in the style of a hand-rolled recursive
/// descent lexer: `peek`/`shift`/`shift_while` over the remaining text.
struct Cursor<'a> {
    text: &'a str,
    chars: std::str::Chars<'a>,
}

impl<'a> Cursor<'a> {
    const EOF: char = '\0';

    fn new(text: &'a str) -> Self {
        Cursor {
            text,
            chars: text.chars(),
        }
    }

    fn pos(&self) -> usize {
        self.text.len() - self.chars.as_str().len()
    }

    fn peek(&self) -> char {
        self.chars.clone().next().unwrap_or(Self::EOF)
    }

    fn peek2(&self) -> char {
        let mut it = self.chars.clone();
        it.next();
        it.next().unwrap_or(Self::EOF)
    }

    fn shift(&mut self) -> char {
        self.chars.next().unwrap_or(Self::EOF)
    }

    fn shift_while(&mut self, f: impl Fn(char) -> bool + Copy) {
        while self.peek() != Self::EOF && f(self.peek()) {
            self.shift();
        }
    }
}

pub fn lex(text: &str) -> Result<Vec<Token>, LexError> {
    let mut cursor = Cursor::new(text);
    let mut tokens = Vec::new();

    loop {
        cursor.shift_while(|c| c == ' ' || c == '\t' || c == '\n' || c == '\r');
        if cursor.peek() == '\0' {
            break;
        }

        let start = cursor.pos();
        let c = cursor.peek();

        if c == '-' && cursor.peek2() == '-' {
            skip_line_comment(&mut cursor);
            continue;
        }
        if c == '#' {
            skip_line_comment(&mut cursor);
            continue;
        }
        if c == '/' && cursor.peek2() == '/' {
            skip_line_comment(&mut cursor);
            continue;
        }

        let kind = match c {
            '+' => {
                cursor.shift();
                TokenKind::Plus
            }
            '-' => {
                cursor.shift();
                TokenKind::Minus
            }
            '*' => {
                cursor.shift();
                TokenKind::Star
            }
            '/' => {
                cursor.shift();
                TokenKind::DividedBy
            }
            '%' => {
                cursor.shift();
                TokenKind::Mod
            }
            '=' => {
                cursor.shift();
                if cursor.peek() == '=' {
                    cursor.shift();
                }
                TokenKind::Equals
            }
            '!' if cursor.peek2() == '=' => {
                cursor.shift();
                cursor.shift();
                TokenKind::NotEqual
            }
            '>' => {
                cursor.shift();
                if cursor.peek() == '=' {
                    cursor.shift();
                    TokenKind::GreaterThanOrEqual
                } else {
                    TokenKind::GreaterThan
                }
            }
            '<' => {
                cursor.shift();
                if cursor.peek() == '=' {
                    cursor.shift();
                    TokenKind::LessThanOrEqual
                } else {
                    TokenKind::LessThan
                }
            }
            '(' => {
                cursor.shift();
                TokenKind::LParen
            }
            ')' => {
                cursor.shift();
                TokenKind::RParen
            }
            ',' => {
                cursor.shift();
                TokenKind::Comma
            }
            '.' if !cursor.peek2().is_ascii_digit() => {
                cursor.shift();
                TokenKind::Dot
            }
            '[' => lex_bracketed_id(&mut cursor)?,
            '\'' | '"' => lex_string(&mut cursor)?,
            'r' if cursor.peek2() == '\'' || cursor.peek2() == '"' => lex_string(&mut cursor)?,
            c if c.is_ascii_digit() || (c == '.' && cursor.peek2().is_ascii_digit()) => {
                lex_number(&mut cursor)
            }
            c if c.is_ascii_alphabetic() || c == '_' => lex_id(&mut cursor),
            other => {
                return Err(LexError {
                    message: format!("Unexpected token: {other:?}"),
                    span: Span::new(start, start + other.len_utf8()),
                });
            }
        };

        tokens.push(Token {
            kind,
            span: Span::new(start, cursor.pos()),
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(cursor.pos(), cursor.pos()),
    });
    Ok(tokens)
}

fn skip_line_comment(cursor: &mut Cursor) {
    cursor.shift_while(|c| c != '\n');
}

fn lex_string(cursor: &mut Cursor) -> Result<TokenKind, LexError> {
    let start = cursor.pos();
    if cursor.peek() == 'r' {
        cursor.shift();
    }
    let delim = cursor.shift();
    let mut s = String::new();
    loop {
        let c = cursor.shift();
        if c == delim {
            break;
        }
        if c == '\0' {
            return Err(LexError {
                message: "Unterminated string literal".to_string(),
                span: Span::new(start, cursor.pos()),
            });
        }
        s.push(c);
    }
    Ok(TokenKind::Str(s))
}

fn lex_bracketed_id(cursor: &mut Cursor) -> Result<TokenKind, LexError> {
    let start = cursor.pos();
    cursor.shift(); // consume '['
    let mut s = String::new();
    loop {
        let c = cursor.shift();
        if c == ']' {
            break;
        }
        if c == '\0' {
            return Err(LexError {
                message: "Unterminated bracketed identifier".to_string(),
                span: Span::new(start, cursor.pos()),
            });
        }
        s.push(c);
    }
    Ok(TokenKind::Id(s))
}

fn lex_number(cursor: &mut Cursor) -> TokenKind {
    let start = cursor.pos();
    cursor.shift_while(|c| c.is_ascii_digit());
    let mut is_float = false;
    if cursor.peek() == '.' && cursor.peek2().is_ascii_digit() {
        is_float = true;
        cursor.shift();
        cursor.shift_while(|c| c.is_ascii_digit());
    }
    if cursor.peek() == 'e' || cursor.peek() == 'E' {
        cursor.shift();
        cursor.shift_while(|c| c.is_ascii_digit());
    }
    let text = &cursor.text[start..cursor.pos()];
    if is_float {
        TokenKind::Float(text.parse().unwrap_or(0.0))
    } else {
        // The source grammar allows a bare exponent on an integer literal
        // (`1e3` lexes as INTEGER); chrono/BigQuery never emit this but we
        // keep the original's leniency and just truncate the numeric value.
        match text.parse::<i64>() {
            Ok(v) => TokenKind::Integer(v),
            Err(_) => TokenKind::Integer(text.parse::<f64>().unwrap_or(0.0) as i64),
        }
    }
}

fn lex_id(cursor: &mut Cursor) -> TokenKind {
    let start = cursor.pos();
    cursor.shift_while(|c| c.is_ascii_alphanumeric() || c == '_');
    let text = &cursor.text[start..cursor.pos()];
    let lower = text.to_ascii_lowercase();
    match reserved_word(&lower) {
        Some(kw) => kw,
        None => TokenKind::Id(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex(text)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect::<Vec<_>>()
    }

    #[test]
    fn lexes_select_star() {
        assert_eq!(
            kinds("SELECT * FROM foo"),
            vec![
                TokenKind::Select,
                TokenKind::Star,
                TokenKind::From,
                TokenKind::Id("foo".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keyword_case_insensitive() {
        assert_eq!(
            kinds("select Select SELECT"),
            vec![
                TokenKind::Select,
                TokenKind::Select,
                TokenKind::Select,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn bracketed_identifier_bypasses_keyword_lookup() {
        assert_eq!(
            kinds("[select]"),
            vec![TokenKind::Id("select".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn bracketed_identifier_with_dots_and_digits() {
        assert_eq!(
            kinds("[dataset.table1]"),
            vec![
                TokenKind::Id("dataset.table1".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_literal_with_r_prefix() {
        assert_eq!(
            kinds(r#"r'abc' "xyz""#),
            vec![
                TokenKind::Str("abc".to_string()),
                TokenKind::Str("xyz".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 -- comment\n+ 2 # another\n/ 3 // last"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Plus,
                TokenKind::Integer(2),
                TokenKind::DividedBy,
                TokenKind::Integer(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn float_and_int_literals() {
        assert_eq!(
            kinds("1 1.5 2e3"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Float(1.5),
                TokenKind::Integer(2000),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unexpected_character_errors() {
        assert!(lex("@").is_err());
    }
}
