//! Read-only guard applied before any SQL text reaches the database.
//!
//! The check is lexical: the statement must start with the `SELECT` keyword
//! and may contain at most one statement. Semicolons inside string literals
//! (including `E''` and dollar-quoted ones), quoted identifiers and comments
//! are ignored; a trailing semicolon is
//! allowed as long as nothing but whitespace follows it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsafeQuery {
    #[error("query text is empty")]
    Empty,

    #[error("only SELECT statements may run, found `{0}`")]
    NotSelect(String),

    #[error("multiple statements are not allowed (`;` at byte {0})")]
    MultipleStatements(usize),

    #[error("unterminated {0}")]
    Unterminated(&'static str),
}

/// Returns the statement with surrounding whitespace and an optional
/// trailing semicolon removed, or the reason it must not run.
pub fn ensure_read_only(sql: &str) -> Result<&str, UnsafeQuery> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(UnsafeQuery::Empty);
    }

    let keyword: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if !keyword.eq_ignore_ascii_case("select") {
        let found = if keyword.is_empty() {
            trimmed.chars().next().map(String::from).unwrap_or_default()
        } else {
            keyword
        };
        return Err(UnsafeQuery::NotSelect(found));
    }

    match find_statement_end(trimmed)? {
        Some(pos) => {
            if !trimmed[pos + 1..].trim().is_empty() {
                return Err(UnsafeQuery::MultipleStatements(pos));
            }
            Ok(trimmed[..pos].trim_end())
        }
        None => Ok(trimmed),
    }
}

#[derive(Clone, Copy)]
enum Lexeme {
    Code,
    Literal { backslash_escapes: bool },
    Identifier,
    LineComment,
    BlockComment,
    /// `$tag$ ... $tag$`; the tag (dollars included) is `sql[start..end]`.
    DollarQuoted { start: usize, end: usize },
}

/// Byte offset of the first `;` outside literals and comments.
fn find_statement_end(sql: &str) -> Result<Option<usize>, UnsafeQuery> {
    let bytes = sql.as_bytes();
    let mut state = Lexeme::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            Lexeme::Code => match b {
                b';' => return Ok(Some(i)),
                b'\'' => {
                    let escaped = i > 0
                        && matches!(bytes[i - 1], b'e' | b'E')
                        && (i < 2 || !is_word_byte(bytes[i - 2]));
                    state = Lexeme::Literal {
                        backslash_escapes: escaped,
                    };
                }
                b'"' => state = Lexeme::Identifier,
                b'$' if i == 0 || !is_word_byte(bytes[i - 1]) => {
                    if let Some(end) = dollar_tag_end(bytes, i) {
                        state = Lexeme::DollarQuoted { start: i, end };
                        i = end - 1;
                    }
                }
                b'-' if next == Some(b'-') => {
                    state = Lexeme::LineComment;
                    i += 1;
                }
                b'/' if next == Some(b'*') => {
                    state = Lexeme::BlockComment;
                    i += 1;
                }
                _ => {}
            },
            Lexeme::Literal { backslash_escapes } => {
                if backslash_escapes && b == b'\\' {
                    i += 1;
                } else if b == b'\'' {
                    if next == Some(b'\'') {
                        i += 1;
                    } else {
                        state = Lexeme::Code;
                    }
                }
            }
            Lexeme::Identifier => {
                if b == b'"' {
                    if next == Some(b'"') {
                        i += 1;
                    } else {
                        state = Lexeme::Code;
                    }
                }
            }
            Lexeme::LineComment => {
                if b == b'\n' {
                    state = Lexeme::Code;
                }
            }
            Lexeme::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = Lexeme::Code;
                    i += 1;
                }
            }
            Lexeme::DollarQuoted { start, end } => {
                let tag = &bytes[start..end];
                if bytes[i..].starts_with(tag) {
                    state = Lexeme::Code;
                    i += tag.len() - 1;
                }
            }
        }
        i += 1;
    }

    match state {
        Lexeme::Code | Lexeme::LineComment => Ok(None),
        Lexeme::Literal { .. } => Err(UnsafeQuery::Unterminated("string literal")),
        Lexeme::Identifier => Err(UnsafeQuery::Unterminated("quoted identifier")),
        Lexeme::BlockComment => Err(UnsafeQuery::Unterminated("block comment")),
        Lexeme::DollarQuoted { .. } => Err(UnsafeQuery::Unterminated("dollar-quoted string")),
    }
}

/// End (exclusive) of a dollar-quote opener starting at `start`: `$$` or
/// `$tag$` where the tag is an identifier. `$1` style parameters are not
/// openers.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if let Some(&first) = bytes.get(j) {
        if first.is_ascii_digit() {
            return None;
        }
    }
    while j < bytes.len() && is_word_byte(bytes[j]) {
        j += 1;
    }
    (bytes.get(j) == Some(&b'$')).then_some(j + 1)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
