//! Tokenizer for formula scripts.
//!
//! `logos` produces the raw token stream; [`tokenize`] then runs a layout pass
//! that turns line starts into `Newline`, `Indent` and `Dedent` tokens the way
//! an indentation-sensitive grammar expects. Line breaks inside brackets do
//! not end a logical line.

use logos::Logos;

use crate::errors::{InvalidExpression, Result};
use crate::parser::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\n\f]+|#[^\n]*)")]
pub enum RawToken {
    // Keywords
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("while")]
    While,
    #[token("break")]
    Break,
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("pass")]
    Pass,
    #[token("try")]
    Try,
    #[token("except")]
    Except,
    #[token("finally")]
    Finally,
    #[token("as")]
    As,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("is")]
    Is,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    // Literals
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),
    #[regex(r"[0-9][0-9_]*", parse_int)]
    Int(i64),
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", parse_float)]
    Float(f64),
    #[regex(r#""([^"\\\n]|\\.)*""#, unescape)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, unescape)]
    Str(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("<<")]
    LShift,
    #[token(">>")]
    RShift,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("=")]
    Assign,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,
}

/// A token after the layout pass.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Raw(RawToken),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn parse_int(lex: &mut logos::Lexer<RawToken>) -> Option<i64> {
    lex.slice().replace('_', "").parse().ok()
}

fn parse_float(lex: &mut logos::Lexer<RawToken>) -> Option<f64> {
    lex.slice().replace('_', "").parse().ok()
}

fn unescape(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' => out.push(hex_escape(&mut chars, 2)?),
            'u' => out.push(hex_escape(&mut chars, 4)?),
            other => {
                // Unknown escapes are kept verbatim.
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

fn hex_escape(chars: &mut core::str::Chars<'_>, digits: usize) -> Option<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return None;
    }
    char::from_u32(u32::from_str_radix(&hex, 16).ok()?)
}

/// Width of the whitespace that precedes `offset` on its line. Tabs advance
/// to the next multiple of eight.
fn column(source: &str, offset: usize) -> usize {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..offset].chars().fold(0, |col, c| match c {
        '\t' => (col / 8 + 1) * 8,
        _ => col + 1,
    })
}

/// Tokenize a script, producing layout tokens for an indentation grammar.
///
/// The indentation of the first line is the baseline, so a script indented
/// uniformly (as often happens when it is stored inside another document)
/// parses the same as its dedented form.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = Vec::new();
    let mut depth = 0usize;
    let mut prev_end: Option<usize> = None;

    for (raw, range) in RawToken::lexer(source).spanned() {
        let span = Span::from(range.clone());
        let raw = raw.map_err(|_| {
            InvalidExpression::syntax(
                format!("Invalid token '{}'", span.str_of(source)),
                span.clone(),
            )
        })?;

        let starts_line = match prev_end {
            None => true,
            Some(end) => source[end..range.start].contains('\n'),
        };
        if starts_line && depth == 0 {
            if let Some(end) = prev_end {
                tokens.push(Token {
                    kind: TokenKind::Newline,
                    span: Span::new(end, end),
                });
            }
            let col = column(source, range.start);
            let top = indents.last().copied();
            match top {
                None => indents.push(col),
                Some(top) if col > top => {
                    indents.push(col);
                    tokens.push(Token {
                        kind: TokenKind::Indent,
                        span: Span::new(range.start, range.start),
                    });
                }
                Some(_) => {
                    while indents.len() > 1 && indents.last().is_some_and(|&top| col < top) {
                        indents.pop();
                        tokens.push(Token {
                            kind: TokenKind::Dedent,
                            span: Span::new(range.start, range.start),
                        });
                    }
                    if indents.last() != Some(&col) {
                        return Err(InvalidExpression::syntax(
                            "Unindent does not match any outer indentation level",
                            span,
                        ));
                    }
                }
            }
        }

        match raw {
            RawToken::LParen | RawToken::LBracket | RawToken::LBrace => depth += 1,
            RawToken::RParen | RawToken::RBracket | RawToken::RBrace => {
                depth = depth.saturating_sub(1)
            }
            _ => {}
        }
        tokens.push(Token {
            kind: TokenKind::Raw(raw),
            span,
        });
        prev_end = Some(range.end);
    }

    let end = source.len();
    if prev_end.is_some() {
        tokens.push(Token {
            kind: TokenKind::Newline,
            span: Span::new(end, end),
        });
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token {
            kind: TokenKind::Dedent,
            span: Span::new(end, end),
        });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(end, end),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_expression() {
        assert_eq!(
            kinds("1 + x"),
            vec![
                TokenKind::Raw(RawToken::Int(1)),
                TokenKind::Raw(RawToken::Plus),
                TokenKind::Raw(RawToken::Name("x".into())),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_beat_identifiers() {
        assert_eq!(
            kinds("if iffy"),
            vec![
                TokenKind::Raw(RawToken::If),
                TokenKind::Raw(RawToken::Name("iffy".into())),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1_000 2.5 .5 1e3"),
            vec![
                TokenKind::Raw(RawToken::Int(1000)),
                TokenKind::Raw(RawToken::Float(2.5)),
                TokenKind::Raw(RawToken::Float(0.5)),
                TokenKind::Raw(RawToken::Float(1000.0)),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"'a\'b' "c\nd" '\x41\u0042'"#),
            vec![
                TokenKind::Raw(RawToken::Str("a'b".into())),
                TokenKind::Raw(RawToken::Str("c\nd".into())),
                TokenKind::Raw(RawToken::Str("AB".into())),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_indentation() {
        let source = "if x:\n    y\n    z\nw";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Raw(RawToken::If),
                TokenKind::Raw(RawToken::Name("x".into())),
                TokenKind::Raw(RawToken::Colon),
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Raw(RawToken::Name("y".into())),
                TokenKind::Newline,
                TokenKind::Raw(RawToken::Name("z".into())),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Raw(RawToken::Name("w".into())),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        assert_eq!(
            kinds("[1,\n  2]"),
            vec![
                TokenKind::Raw(RawToken::LBracket),
                TokenKind::Raw(RawToken::Int(1)),
                TokenKind::Raw(RawToken::Comma),
                TokenKind::Raw(RawToken::Int(2)),
                TokenKind::Raw(RawToken::RBracket),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        assert_eq!(
            kinds("# header\n\nx  # trailing\n"),
            vec![
                TokenKind::Raw(RawToken::Name("x".into())),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_uniform_indentation_is_baseline() {
        assert_eq!(kinds("    x\n    y"), kinds("x\ny"));
    }

    #[test]
    fn test_bad_dedent() {
        let err = tokenize("if x:\n    y\n  z").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_invalid_token() {
        let err = tokenize("a $ b").unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.span(), Some(&Span::new(2, 3)));
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }
}
