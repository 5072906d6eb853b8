// Statement compiler
//
// - template: splits `{}`-slotted templates into literal chunks
// - token: lexes chunks + values into placeholders or inlined literals
//
// A `Statement` keeps its token stream next to the rendered text so `append` can
// renumber placeholders without re-scanning SQL.

pub mod template;
mod token;

use std::fmt;

use crate::error::SqlGuardError;
use crate::types::RowValues;

use token::Token;

/// How interpolated values were compiled into a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementKind {
    /// Values become `$n` placeholders and travel in `values`.
    #[default]
    Parameterized,
    /// Values are rendered straight into the text. Never carries values.
    Raw,
}

impl StatementKind {
    #[must_use]
    pub fn is_raw(self) -> bool {
        matches!(self, StatementKind::Raw)
    }

    /// Kind of `left.append(right)`: raw only when both sides are raw.
    fn combine(self, other: StatementKind) -> StatementKind {
        if self.is_raw() && other.is_raw() {
            StatementKind::Raw
        } else {
            StatementKind::Parameterized
        }
    }
}

/// A compiled SQL statement: query text with `$1..$N` placeholders plus the values bound
/// to them, in order.
///
/// Build one with [`sql!`](crate::sql) (parameterized) or [`raw!`](crate::raw) (values
/// inlined as text). Statements are immutable; [`append`](Statement::append) returns a
/// new one.
/// ```rust
/// use sql_guard::prelude::*;
///
/// let stmt = sql!("SELECT {}::int", 42).append(&sql!("+{}", 43));
/// assert_eq!(stmt.text(), "SELECT $1::int +$2");
/// assert_eq!(stmt.values(), &[RowValues::Int(42), RowValues::Int(43)]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    kind: StatementKind,
    tokens: Vec<Token>,
    text: String,
    values: Vec<RowValues>,
    name: Option<String>,
}

impl Statement {
    /// Compile literal chunks and the values between them.
    ///
    /// `chunks` must hold exactly one more entry than `values`; an empty template is a
    /// single empty chunk.
    ///
    /// # Errors
    /// Returns `SqlGuardError::MalformedTemplate` when the counts do not line up.
    pub fn compile<S: AsRef<str>>(
        kind: StatementKind,
        chunks: &[S],
        values: Vec<RowValues>,
    ) -> Result<Statement, SqlGuardError> {
        if chunks.len() != values.len() + 1 {
            return Err(SqlGuardError::MalformedTemplate(format!(
                "{} chunks cannot surround {} values",
                chunks.len(),
                values.len()
            )));
        }
        let chunks = chunks.iter().map(|c| c.as_ref().to_string()).collect();
        Ok(Self::assemble(kind, chunks, values))
    }

    /// Compile a `{}`-slotted template into a parameterized statement.
    ///
    /// # Errors
    /// Returns `SqlGuardError::MalformedTemplate` on unbalanced braces or a slot/value
    /// count mismatch.
    pub fn parameterized(template: &str, values: Vec<RowValues>) -> Result<Statement, SqlGuardError> {
        let chunks = template::split(template)?;
        Self::compile(StatementKind::Parameterized, &chunks, values)
    }

    /// Compile a `{}`-slotted template into a raw fragment, inlining every value.
    ///
    /// # Errors
    /// Returns `SqlGuardError::MalformedTemplate` on unbalanced braces or a slot/value
    /// count mismatch.
    pub fn raw(template: &str, values: Vec<RowValues>) -> Result<Statement, SqlGuardError> {
        let chunks = template::split(template)?;
        Self::compile(StatementKind::Raw, &chunks, values)
    }

    /// Entry point for `sql!` / `raw!`; the slot count was asserted at compile time.
    #[doc(hidden)]
    #[must_use]
    pub fn from_checked_template(
        kind: StatementKind,
        template: &'static str,
        values: Vec<RowValues>,
    ) -> Statement {
        Self::assemble(kind, template::split_checked(template), values)
    }

    fn assemble(kind: StatementKind, chunks: Vec<String>, values: Vec<RowValues>) -> Statement {
        let (tokens, values) = token::lex(kind, chunks, values);
        let text = token::render(&tokens);
        Statement {
            kind,
            tokens,
            text,
            values,
            name: None,
        }
    }

    /// Final query text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bound values, index-aligned with the placeholders.
    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    /// Prepared-statement name, if stamped by a prepared handle.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.kind.is_raw()
    }

    /// Number of `$n` placeholders in the text.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, Token::Placeholder(_)))
            .count()
    }

    /// Copy of this statement carrying a prepared-statement name.
    #[must_use]
    pub fn named(&self, name: impl Into<String>) -> Statement {
        Statement {
            name: Some(name.into()),
            ..self.clone()
        }
    }

    /// Compose `self` and `other` into a new statement.
    ///
    /// The texts are joined with one space when both are non-blank; a blank side
    /// contributes nothing, so no stray whitespace builds up. Placeholders of `other` are
    /// renumbered to follow `self`'s values, and its values are appended. Raw operands
    /// bring no values. Neither operand is modified.
    #[must_use]
    pub fn append(&self, other: &Statement) -> Statement {
        let kind = self.kind.combine(other.kind);

        if other.is_blank() {
            return Statement {
                kind,
                ..self.clone()
            };
        }
        if self.is_blank() {
            return Statement {
                kind,
                tokens: other.tokens.clone(),
                text: other.text.clone(),
                values: other.values.clone(),
                name: self.name.clone(),
            };
        }

        let offset = self.values.len();
        let mut tokens = Vec::with_capacity(self.tokens.len() + other.tokens.len() + 1);
        tokens.extend(self.tokens.iter().cloned());
        tokens.push(Token::Literal(" ".to_string()));

        let mut text = String::with_capacity(self.text.len() + other.text.len() + 8);
        text.push_str(&self.text);
        text.push(' ');
        for token in &other.tokens {
            let token = token.shifted(offset);
            token.render(&mut text);
            tokens.push(token);
        }

        let mut values = Vec::with_capacity(self.values.len() + other.values.len());
        values.extend(self.values.iter().cloned());
        values.extend(other.values.iter().cloned());

        Statement {
            kind,
            tokens,
            text,
            values,
            name: self.name.clone(),
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{raw, sql};

    #[test]
    fn compiles_without_interpolations() {
        let stmt = sql!("SELECT 1");
        assert_eq!(stmt.text(), "SELECT 1");
        assert!(stmt.values().is_empty());
        assert_eq!(stmt.kind(), StatementKind::Parameterized);
    }

    #[test]
    fn interpolates_one_binding() {
        let stmt = sql!("SELECT {}::int", 42);
        assert_eq!(stmt.text(), "SELECT $1::int");
        assert_eq!(stmt.values(), &[RowValues::Int(42)]);
    }

    #[test]
    fn interpolates_multiple_bindings_in_order() {
        let stmt = sql!(
            "
     SELECT *
     FROM users
     WHERE lower(uname) = lower({})
       AND num = ANY ({})
  ",
            "foo",
            vec![1, 2, 3]
        );
        assert_eq!(
            stmt.text(),
            "
     SELECT *
     FROM users
     WHERE lower(uname) = lower($1)
       AND num = ANY ($2)
  "
        );
        assert_eq!(
            stmt.values(),
            &[
                RowValues::Text("foo".into()),
                RowValues::Array(vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)]),
            ]
        );
        assert_eq!(stmt.placeholder_count(), stmt.values().len());
    }

    #[test]
    fn empty_template_is_empty() {
        let stmt = sql!("");
        assert_eq!(stmt.text(), "");
        assert!(stmt.values().is_empty());
    }

    #[test]
    fn adjacent_slots_keep_empty_chunks() {
        let stmt = sql!("{}{}", 1, 2);
        assert_eq!(stmt.text(), "$1$2");
        let stmt = raw!("{}{}", 1, 2);
        assert_eq!(stmt.text(), "12");
    }

    #[test]
    fn raw_inlines_values() {
        let stmt = raw!("SELECT * FROM bars WHERE n IN ({}, {}) ORDER BY n {}", 1, 3, "desc");
        assert_eq!(stmt.text(), "SELECT * FROM bars WHERE n IN (1, 3) ORDER BY n desc");
        assert!(stmt.values().is_empty());
        assert!(stmt.is_raw());
    }

    #[test]
    fn compile_rejects_mismatched_counts() {
        let err = Statement::compile(StatementKind::Parameterized, &["a", "b"], vec![]);
        assert!(matches!(err, Err(SqlGuardError::MalformedTemplate(_))));

        let err = Statement::parameterized("a = {}", vec![]);
        assert!(matches!(err, Err(SqlGuardError::MalformedTemplate(_))));
    }

    #[test]
    fn runtime_templates_match_macros() {
        let stmt = Statement::parameterized("SELECT {}::int", vec![RowValues::Int(42)]).unwrap();
        assert_eq!(stmt, sql!("SELECT {}::int", 42));
        let frag = Statement::raw("ORDER BY n {}", vec!["asc".into()]).unwrap();
        assert_eq!(frag, raw!("ORDER BY n {}", "asc"));
    }

    #[test]
    fn append_adds_a_space() {
        assert_eq!(sql!("a").append(&raw!("b")).text(), "a b");
    }

    #[test]
    fn append_of_empty_adds_nothing() {
        assert_eq!(sql!("a").append(&sql!("")).text(), "a");
        assert_eq!(sql!("a").append(&raw!("   ")).text(), "a");
        assert_eq!(sql!("").append(&sql!("a")).text(), "a");
        assert_eq!(sql!("a").append(&sql!("")).append(&sql!("")).text(), "a");
    }

    #[test]
    fn append_sql_pads_and_renumbers() {
        assert_eq!(
            sql!("SELECT {}::int", 42).append(&sql!("+{}-", 43)).text(),
            "SELECT $1::int +$2-"
        );
        assert_eq!(
            sql!("SELECT {}::int", 42).append(&sql!("+{}", 43)).text(),
            "SELECT $1::int +$2"
        );
        assert_eq!(
            sql!("SELECT {}::int", 42).append(&sql!("{}-", 43)).text(),
            "SELECT $1::int $2-"
        );
        assert_eq!(
            sql!("SELECT {}::int", 42).append(&sql!("")).text(),
            "SELECT $1::int"
        );
    }

    #[test]
    fn append_sql_concatenates_values() {
        let stmt = sql!("SELECT {}::int", 42).append(&sql!("{}", 43));
        assert_eq!(stmt.values(), &[RowValues::Int(42), RowValues::Int(43)]);
        assert_eq!(stmt.text(), "SELECT $1::int $2");
    }

    #[test]
    fn append_offsets_every_placeholder_of_the_right_side() {
        let left = sql!("a = {} AND b = {}", 1, 2);
        let right = sql!("AND c = {} AND d = {} AND e = {}", 3, 4, 5);
        let stmt = left.append(&right);
        assert_eq!(
            stmt.text(),
            "a = $1 AND b = $2 AND c = $3 AND d = $4 AND e = $5"
        );
        assert_eq!(stmt.values().len(), 5);
        assert_eq!(stmt.placeholder_count(), 5);
    }

    #[test]
    fn append_raw_does_not_affect_values() {
        let stmt = sql!("SELECT {}::int", 42).append(&raw!("{}", 42));
        assert_eq!(stmt.text(), "SELECT $1::int 42");
        assert_eq!(stmt.values(), &[RowValues::Int(42)]);
    }

    #[test]
    fn append_raw_pads_as_expected() {
        let base = sql!("SELECT {}::int", 42);
        assert_eq!(base.append(&raw!("+{}-", 43)).text(), "SELECT $1::int +43-");
        assert_eq!(base.append(&raw!("+{}", 43)).text(), "SELECT $1::int +43");
        assert_eq!(base.append(&raw!("{}-", 43)).text(), "SELECT $1::int 43-");
        assert_eq!(base.append(&raw!("")).text(), "SELECT $1::int");
    }

    #[test]
    fn append_can_be_chained() {
        let stmt = sql!("SELECT {}::int", 42)
            .append(&raw!("{}", 43))
            .append(&sql!("{}", 44))
            .append(&raw!("{}", 45));
        assert_eq!(stmt.text(), "SELECT $1::int 43 $2 45");
        assert_eq!(stmt.values(), &[RowValues::Int(42), RowValues::Int(44)]);
    }

    #[test]
    fn append_leaves_operands_untouched() {
        let base = sql!("SELECT * FROM t WHERE a = {}", 1);
        let first = base.append(&sql!("AND b = {}", 2));
        let second = base.append(&sql!("AND c = {}", 3));
        assert_eq!(base.text(), "SELECT * FROM t WHERE a = $1");
        assert_eq!(base.values().len(), 1);
        assert_eq!(first.text(), "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(second.text(), "SELECT * FROM t WHERE a = $1 AND c = $2");
    }

    #[test]
    fn renumbering_ignores_dollar_text_inside_raw_fragments() {
        let body = raw!("$fn$ SELECT $1 $fn$");
        let stmt = sql!("x = {}", 1).append(&body).append(&sql!("y = {}", 2));
        assert_eq!(stmt.text(), "x = $1 $fn$ SELECT $1 $fn$ y = $2");
        assert_eq!(stmt.values().len(), 2);
    }

    #[test]
    fn append_kind_follows_parameterized_side() {
        assert!(raw!("a").append(&raw!("b")).is_raw());
        assert!(!raw!("a").append(&sql!("b = {}", 1)).is_raw());
        let stmt = raw!("SELECT {}", "n").append(&sql!("WHERE n = {}", 1));
        assert_eq!(stmt.text(), "SELECT n WHERE n = $1");
        assert_eq!(stmt.values(), &[RowValues::Int(1)]);
    }

    #[test]
    fn named_keeps_the_original_unnamed() {
        let stmt = sql!("SELECT {}", 1);
        let named = stmt.named("foo");
        assert_eq!(named.name(), Some("foo"));
        assert_eq!(stmt.name(), None);
        assert_eq!(named.append(&sql!("+{}", 2)).name(), Some("foo"));
    }
}
