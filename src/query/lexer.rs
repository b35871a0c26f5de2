//! Hand-rolled `Peekable<Chars>` tokenizer for the query language (spec
//! §4.6), in the idiom of `probelabs-probe`'s `tokenize`/`lex_identifier`/
//! `lex_quoted_string` (`examples/probelabs-probe/src/search/elastic_query.rs`).
//! Keywords are matched case-sensitively; everything else (identifiers) is
//! left as-is for the parser/compiler to case-fold.

use crate::error::LibraryError;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    And,
    Or,
    Not,
    Colon,
    Dot,
    LParen,
    RParen,
    Ident(String),
    QuotedString(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

fn lex_error(position: usize, message: impl Into<String>) -> LibraryError {
    LibraryError::Parse { position, message: message.into() }
}

fn lex_quoted_string(chars: &mut Peekable<CharIndices>, start: usize) -> Result<String, LibraryError> {
    let mut buf = String::new();
    let mut escaped = false;
    while let Some(&(_, ch)) = chars.peek() {
        if escaped {
            buf.push(ch);
            escaped = false;
            chars.next();
        } else if ch == '\\' {
            escaped = true;
            chars.next();
        } else if ch == '"' {
            chars.next();
            return Ok(buf);
        } else {
            buf.push(ch);
            chars.next();
        }
    }
    Err(lex_error(start, "unterminated quoted string"))
}

fn lex_identifier(chars: &mut Peekable<CharIndices>) -> String {
    let mut buf = String::new();
    while let Some(&(_, ch)) = chars.peek() {
        if ch.is_alphanumeric() || ch == '_' || ch == '-' {
            buf.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    buf
}

/// Scans the whole input up front into a flat token list, as the donor
/// idiom does, rather than streaming — query strings are short enough that
/// this costs nothing and keeps the parser's lookahead trivial.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LibraryError> {
    let mut chars = input.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push(Spanned { token: Token::LParen, position: pos });
                chars.next();
            }
            ')' => {
                tokens.push(Spanned { token: Token::RParen, position: pos });
                chars.next();
            }
            ':' => {
                tokens.push(Spanned { token: Token::Colon, position: pos });
                chars.next();
            }
            '.' => {
                tokens.push(Spanned { token: Token::Dot, position: pos });
                chars.next();
            }
            '"' => {
                chars.next();
                let s = lex_quoted_string(&mut chars, pos)?;
                tokens.push(Spanned { token: Token::QuotedString(s), position: pos });
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => {
                let ident = lex_identifier(&mut chars);
                let token = match ident.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Ident(ident),
                };
                tokens.push(Spanned { token, position: pos });
            }
            other => return Err(lex_error(pos, format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(kinds("and"), vec![Token::Ident("and".into())]);
        assert_eq!(kinds("AND"), vec![Token::And]);
    }

    #[test]
    fn quoted_string_handles_escapes() {
        assert_eq!(kinds(r#""a \"b\" c""#), vec![Token::QuotedString("a \"b\" c".into())]);
    }

    #[test]
    fn unterminated_quote_reports_position() {
        let err = tokenize(r#"tag:"oops"#).unwrap_err();
        assert!(matches!(err, LibraryError::Parse { .. }));
    }
}
