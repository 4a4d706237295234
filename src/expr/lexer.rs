//! Predicate lexer: tokenizes a selection expression.

use crate::{Error, Result};

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords (and their symbolic spellings)
    And, Or, Not, Is, In, Null, True, False,

    // Literals
    Integer, Float, StringLiteral,

    // Column references
    Identifier,

    // Punctuation
    LParen, RParen, LBracket, RBracket, Comma,

    // Operators
    Eq, Neq, Lt, Lte, Gt, Gte,
    Plus, Minus, Star, Slash, Percent,

    Eof,
}

/// Tokenize a predicate string.
///
/// Accepts Python-style operators (`==`, `!=`, `&`, `|`, `~`) alongside the
/// keyword forms (`and`, `or`, `not`). Column names that are not plain
/// identifiers can be quoted with backticks.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            // String literals
            '\'' | '"' => {
                let quote = ch;
                chars.next();
                let start = pos;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => {
                            if let Some((_, escaped)) = chars.next() {
                                match escaped {
                                    'n' => s.push('\n'),
                                    't' => s.push('\t'),
                                    '\\' => s.push('\\'),
                                    c if c == quote => s.push(c),
                                    c => { s.push('\\'); s.push(c); }
                                }
                            }
                        }
                        Some((end, c)) if c == quote => {
                            tokens.push(Token {
                                kind: TokenKind::StringLiteral,
                                span: Span { start, end: end + 1 },
                                text: s,
                            });
                            break;
                        }
                        Some((_, c)) => s.push(c),
                        None => return Err(Error::SyntaxError {
                            position: start,
                            message: "Unterminated string literal".into(),
                        }),
                    }
                }
            }

            // Quoted column name: `my column`
            '`' => {
                chars.next();
                let start = pos;
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((end, '`')) => {
                            tokens.push(Token {
                                kind: TokenKind::Identifier,
                                span: Span { start, end: end + 1 },
                                text: name,
                            });
                            break;
                        }
                        Some((_, c)) => name.push(c),
                        None => return Err(Error::SyntaxError {
                            position: start,
                            message: "Unterminated quoted column name".into(),
                        }),
                    }
                }
            }

            // Numbers
            c if c.is_ascii_digit() => {
                let start = pos;
                let mut num = String::new();
                let mut is_float = false;
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() {
                        num.push(c);
                        chars.next();
                    } else if c == '.' && !is_float {
                        is_float = true;
                        num.push(c);
                        chars.next();
                    } else if (c == 'e' || c == 'E') && !num.contains(['e', 'E']) {
                        is_float = true;
                        num.push(c);
                        chars.next();
                        if let Some(&(_, sign)) = chars.peek() {
                            if sign == '+' || sign == '-' {
                                num.push(sign);
                                chars.next();
                            }
                        }
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: if is_float { TokenKind::Float } else { TokenKind::Integer },
                    span: Span { start, end: start + num.len() },
                    text: num,
                });
            }

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => {
                let start = pos;
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let kind = keyword_or_ident(&ident);
                tokens.push(Token {
                    kind,
                    span: Span { start, end: start + ident.len() },
                    text: ident,
                });
            }

            '(' => { chars.next(); tokens.push(punct(TokenKind::LParen, pos, "(")); }
            ')' => { chars.next(); tokens.push(punct(TokenKind::RParen, pos, ")")); }
            '[' => { chars.next(); tokens.push(punct(TokenKind::LBracket, pos, "[")); }
            ']' => { chars.next(); tokens.push(punct(TokenKind::RBracket, pos, "]")); }
            ',' => { chars.next(); tokens.push(punct(TokenKind::Comma, pos, ",")); }
            '&' => { chars.next(); tokens.push(punct(TokenKind::And, pos, "&")); }
            '|' => { chars.next(); tokens.push(punct(TokenKind::Or, pos, "|")); }
            '~' => { chars.next(); tokens.push(punct(TokenKind::Not, pos, "~")); }
            '+' => { chars.next(); tokens.push(punct(TokenKind::Plus, pos, "+")); }
            '-' => { chars.next(); tokens.push(punct(TokenKind::Minus, pos, "-")); }
            '*' => { chars.next(); tokens.push(punct(TokenKind::Star, pos, "*")); }
            '/' => { chars.next(); tokens.push(punct(TokenKind::Slash, pos, "/")); }
            '%' => { chars.next(); tokens.push(punct(TokenKind::Percent, pos, "%")); }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    tokens.push(punct(TokenKind::Eq, pos, "=="));
                } else {
                    return Err(Error::SyntaxError {
                        position: pos,
                        message: "Unexpected '=', use '==' for equality".into(),
                    });
                }
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    tokens.push(punct(TokenKind::Neq, pos, "!="));
                } else {
                    return Err(Error::SyntaxError {
                        position: pos,
                        message: "Unexpected '!', use '~' or 'not' for negation".into(),
                    });
                }
            }
            '<' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    tokens.push(punct(TokenKind::Lte, pos, "<="));
                } else if matches!(chars.peek(), Some(&(_, '>'))) {
                    chars.next();
                    tokens.push(punct(TokenKind::Neq, pos, "<>"));
                } else {
                    tokens.push(punct(TokenKind::Lt, pos, "<"));
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    tokens.push(punct(TokenKind::Gte, pos, ">="));
                } else {
                    tokens.push(punct(TokenKind::Gt, pos, ">"));
                }
            }

            other => {
                return Err(Error::SyntaxError {
                    position: pos,
                    message: format!("Unexpected character: '{other}'"),
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });

    Ok(tokens)
}

fn punct(kind: TokenKind, pos: usize, text: &str) -> Token {
    Token {
        kind,
        span: Span { start: pos, end: pos + text.len() },
        text: text.to_string(),
    }
}

fn keyword_or_ident(s: &str) -> TokenKind {
    match s.to_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "is" => TokenKind::Is,
        "in" => TokenKind::In,
        "null" | "none" => TokenKind::Null,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => TokenKind::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_style_predicate() {
        let tokens = tokenize("(_TYPE_ == 'transfer') & (amount >= 2.5)").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::Eq,
            TokenKind::StringLiteral,
            TokenKind::RParen,
            TokenKind::And,
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::Gte,
            TokenKind::Float,
            TokenKind::RParen,
            TokenKind::Eof,
        ]);
        assert_eq!(tokens[3].text, "transfer");
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let tokens = tokenize("x is NOT None or flag == True").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::Identifier,
            TokenKind::Is,
            TokenKind::Not,
            TokenKind::Null,
            TokenKind::Or,
            TokenKind::Identifier,
            TokenKind::Eq,
            TokenKind::True,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_quoted_column() {
        let tokens = tokenize("`unit price` > 3").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "unit price");
    }

    #[test]
    fn test_exponent_literal() {
        let tokens = tokenize("1e-3").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].text, "1e-3");
    }

    #[test]
    fn test_single_equals_rejected() {
        let err = tokenize("a = 1").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { position: 2, .. }));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("name == 'abc").is_err());
    }
}
