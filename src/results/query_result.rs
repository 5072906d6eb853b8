use std::collections::HashMap;
use std::sync::Arc;

use super::row::{Row, index_columns};
use crate::types::RowValues;

/// What the connection hands back for one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// The rows returned by the statement
    pub rows: Vec<Row>,
    /// Rows returned, or rows affected for DML without `RETURNING`
    pub row_count: usize,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl QueryResult {
    /// Create an empty result for the given columns with room for `capacity` rows.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>, capacity: usize) -> QueryResult {
        let column_index = Arc::new(index_columns(&column_names));
        QueryResult {
            rows: Vec::with_capacity(capacity),
            row_count: 0,
            column_names: Arc::new(column_names),
            column_index,
        }
    }

    /// Result of a statement that returned no rows but touched `affected` of them.
    #[must_use]
    pub fn affected(affected: usize) -> QueryResult {
        QueryResult {
            row_count: affected,
            ..QueryResult::default()
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Append a row; values must follow the column order.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(Row {
            column_names: Arc::clone(&self.column_names),
            values,
            column_index: Arc::clone(&self.column_index),
        });
        self.row_count += 1;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the result, keeping only its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_columns_and_lookup_by_name() {
        let mut result = QueryResult::with_columns(vec!["n".into(), "label".into()], 2);
        result.add_row_values(vec![RowValues::Int(1), RowValues::Text("one".into())]);
        result.add_row_values(vec![RowValues::Int(3), RowValues::Text("three".into())]);

        assert_eq!(result.row_count, 2);
        let second = &result.rows[1];
        assert_eq!(second.get("n"), Some(&RowValues::Int(3)));
        assert_eq!(second.get("label").and_then(RowValues::as_text), Some("three"));
        assert_eq!(second.get("missing"), None);
        assert!(Arc::ptr_eq(&result.rows[0].column_names, &second.column_names));
    }

    #[test]
    fn duplicate_column_names_resolve_to_first() {
        let row = Row::new(
            Arc::new(vec!["n".into(), "n".into()]),
            vec![RowValues::Int(1), RowValues::Int(2)],
        );
        assert_eq!(row.get("n"), Some(&RowValues::Int(1)));
        assert_eq!(row.get_by_index(1), Some(&RowValues::Int(2)));
    }

    #[test]
    fn affected_only_result_has_no_rows() {
        let result = QueryResult::affected(3);
        assert!(result.is_empty());
        assert_eq!(result.row_count, 3);
    }
}
