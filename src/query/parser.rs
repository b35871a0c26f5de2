//! Recursive-descent parser for the query grammar in spec §4.6, built on
//! top of `lexer::tokenize`. Structured like `probelabs-probe`'s `Parser`
//! (`examples/probelabs-probe/src/search/elastic_query.rs`) — a flat token
//! vector plus a cursor, one method per grammar production — generalized to
//! the five-production grammar this language actually has.

use super::ast::{Node, Property};
use super::lexer::{self, Spanned, Token};
use crate::error::LibraryError;

const CONSTRAINT_TYPES: &[&str] = &["tag", "tag_id", "path", "mediatype", "filetype", "special"];

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

fn parse_err(position: usize, message: impl Into<String>) -> LibraryError {
    LibraryError::Parse { position, message: message.into() }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eof_position(&self) -> usize {
        self.tokens.last().map(|s| s.position + 1).unwrap_or(0)
    }

    fn expect(&mut self, expected: Token) -> Result<(), LibraryError> {
        match self.advance() {
            Some(Spanned { token, .. }) if token == expected => Ok(()),
            Some(Spanned { token, position }) => Err(parse_err(position, format!("expected {expected:?}, found {token:?}"))),
            None => Err(parse_err(self.eof_position(), format!("expected {expected:?}, found end of input"))),
        }
    }

    fn parse_or_list(&mut self) -> Result<Node, LibraryError> {
        let mut elements = vec![self.parse_and_list()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            elements.push(self.parse_and_list()?);
        }
        Ok(if elements.len() == 1 { elements.pop().unwrap() } else { Node::OrList(elements) })
    }

    fn parse_and_list(&mut self) -> Result<Node, LibraryError> {
        let mut terms = vec![self.parse_term()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    terms.push(self.parse_term()?);
                }
                Some(Token::Or) | Some(Token::RParen) | None => break,
                // Adjacency means AND (spec §4.6).
                _ => terms.push(self.parse_term()?),
            }
        }
        Ok(if terms.len() == 1 { terms.pop().unwrap() } else { Node::AndList(terms) })
    }

    fn parse_term(&mut self) -> Result<Node, LibraryError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                Ok(Node::Not(Box::new(self.parse_term()?)))
            }
            Some(Token::LParen) => {
                self.advance();
                let node = self.parse_or_list()?;
                self.expect(Token::RParen)?;
                Ok(node)
            }
            _ => self.parse_constraint(),
        }
    }

    fn parse_constraint(&mut self) -> Result<Node, LibraryError> {
        let mut type_ = "tag".to_string();
        if let Some(Token::Ident(name)) = self.peek() {
            if CONSTRAINT_TYPES.contains(&name.as_str()) && matches!(self.peek_at(1), Some(Token::Colon)) {
                type_ = name.clone();
                self.advance();
                self.advance();
            }
        }

        let value = self.parse_value()?;
        let mut properties = Vec::new();
        while matches!(self.peek(), Some(Token::Dot)) {
            self.advance();
            let name = self.parse_ident()?;
            self.expect(Token::Colon)?;
            let prop_value = self.parse_value()?;
            properties.push(Property { name, value: prop_value });
        }

        Ok(Node::Constraint { type_, value, properties })
    }

    fn parse_value(&mut self) -> Result<String, LibraryError> {
        match self.advance() {
            Some(Spanned { token: Token::Ident(s), .. }) => Ok(s),
            Some(Spanned { token: Token::QuotedString(s), .. }) => Ok(s),
            Some(Spanned { token, position }) => Err(parse_err(position, format!("expected a value, found {token:?}"))),
            None => Err(parse_err(self.eof_position(), "expected a value, found end of input")),
        }
    }

    fn parse_ident(&mut self) -> Result<String, LibraryError> {
        match self.advance() {
            Some(Spanned { token: Token::Ident(s), .. }) => Ok(s),
            Some(Spanned { token, position }) => Err(parse_err(position, format!("expected an identifier, found {token:?}"))),
            None => Err(parse_err(self.eof_position(), "expected an identifier, found end of input")),
        }
    }
}

/// Parses `input` into an AST. Empty (or all-whitespace) input yields
/// `Ok(None)` — "no filter" — per spec §4.6; malformed input is a
/// structured `LibraryError::Parse` carrying the offending position.
pub fn parse(input: &str) -> Result<Option<Node>, LibraryError> {
    let tokens = lexer::tokenize(input)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.parse_or_list()?;
    if let Some(Spanned { token, position }) = parser.advance() {
        return Err(parse_err(position, format!("unexpected trailing token {token:?}")));
    }
    Ok(Some(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_no_filter() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn bare_value_defaults_to_tag_constraint() {
        let ast = parse("cat").unwrap().unwrap();
        assert_eq!(ast, Node::Constraint { type_: "tag".into(), value: "cat".into(), properties: vec![] });
    }

    #[test]
    fn adjacency_is_and() {
        let ast = parse("cat dog").unwrap().unwrap();
        assert!(matches!(ast, Node::AndList(terms) if terms.len() == 2));
    }

    #[test]
    fn or_has_lower_precedence_than_and() {
        let ast = parse("cat dog OR bird").unwrap().unwrap();
        match ast {
            Node::OrList(elements) => {
                assert_eq!(elements.len(), 2);
                assert!(matches!(&elements[0], Node::AndList(t) if t.len() == 2));
            }
            other => panic!("expected OrList, got {other:?}"),
        }
    }

    #[test]
    fn not_binds_to_single_term() {
        let ast = parse("NOT tag:cat").unwrap().unwrap();
        assert!(matches!(ast, Node::Not(_)));
    }

    #[test]
    fn parenthesized_group_overrides_precedence() {
        let ast = parse("(cat OR dog) AND bird").unwrap().unwrap();
        match ast {
            Node::AndList(terms) => {
                assert!(matches!(&terms[0], Node::OrList(_)));
            }
            other => panic!("expected AndList, got {other:?}"),
        }
    }

    #[test]
    fn explicit_type_prefix_is_parsed() {
        let ast = parse("mediatype:image").unwrap().unwrap();
        assert_eq!(ast, Node::Constraint { type_: "mediatype".into(), value: "image".into(), properties: vec![] });
    }

    #[test]
    fn property_suffix_is_parsed() {
        let ast = parse("tag:cat.color:red").unwrap().unwrap();
        match ast {
            Node::Constraint { properties, .. } => {
                assert_eq!(properties, vec![Property { name: "color".into(), value: "red".into() }]);
            }
            other => panic!("expected Constraint, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_paren_is_a_structured_error() {
        let err = parse("(cat AND dog").unwrap_err();
        assert!(matches!(err, LibraryError::Parse { .. }));
    }
}
