use crate::types::RowValues;

use super::StatementKind;

/// One lexed piece of a compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Template text copied verbatim.
    Literal(String),
    /// Positional parameter, 1-based.
    Placeholder(usize),
    /// A value rendered into the text by raw mode.
    Inline(String),
}

impl Token {
    pub(crate) fn render(&self, out: &mut String) {
        match self {
            Token::Literal(text) | Token::Inline(text) => out.push_str(text),
            Token::Placeholder(idx) => {
                out.push('$');
                out.push_str(&idx.to_string());
            }
        }
    }

    /// Copy of this token with its placeholder index moved up by `offset`.
    pub(crate) fn shifted(&self, offset: usize) -> Token {
        match self {
            Token::Placeholder(idx) => Token::Placeholder(idx + offset),
            other => other.clone(),
        }
    }
}

/// Interleave template chunks with values.
///
/// Parameterized mode turns value `i` into placeholder `$i+1` and keeps the value;
/// raw mode inlines the value's literal form and keeps nothing. Extra chunks or values
/// beyond the interleaving are emitted as they come, callers check the counts first.
pub(crate) fn lex(
    kind: StatementKind,
    chunks: Vec<String>,
    values: Vec<RowValues>,
) -> (Vec<Token>, Vec<RowValues>) {
    let mut tokens = Vec::with_capacity(chunks.len() + values.len());
    let mut bound = Vec::with_capacity(if kind.is_raw() { 0 } else { values.len() });
    let mut values = values.into_iter();

    for chunk in chunks {
        if !chunk.is_empty() {
            tokens.push(Token::Literal(chunk));
        }
        if let Some(value) = values.next() {
            tokens.push(slot_token(kind, value, &mut bound));
        }
    }
    for value in values {
        tokens.push(slot_token(kind, value, &mut bound));
    }

    (tokens, bound)
}

fn slot_token(kind: StatementKind, value: RowValues, bound: &mut Vec<RowValues>) -> Token {
    match kind {
        StatementKind::Parameterized => {
            bound.push(value);
            Token::Placeholder(bound.len())
        }
        StatementKind::Raw => Token::Inline(value.to_literal()),
    }
}

pub(crate) fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        token.render(&mut out);
    }
    out
}
