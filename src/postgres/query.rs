use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::Statement;
use tokio_postgres::types::{FromSql, Type};

use crate::config::NumericDecoding;
use crate::error::SqlGuardError;
use crate::results::QueryResult;
use crate::types::RowValues;

use super::numeric::PgNumeric;

/// Build a result using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_from_statement(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
    numeric: NumericDecoding,
) -> Result<QueryResult, SqlGuardError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result = QueryResult::with_columns(column_names, rows.len());
    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx, numeric)?);
        }
        result.add_row_values(row_values);
    }
    Ok(result)
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `SqlGuardError` if the column cannot be decoded.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
    numeric: NumericDecoding,
) -> Result<RowValues, SqlGuardError> {
    let type_info = row.columns()[idx].type_().clone();

    let value = match type_info {
        Type::INT2 => nullable::<i16>(row, idx)?.map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => nullable::<i32>(row, idx)?.map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => nullable::<i64>(row, idx)?.map(RowValues::Int),
        Type::FLOAT4 => nullable::<f32>(row, idx)?.map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => nullable::<f64>(row, idx)?.map(RowValues::Float),
        Type::NUMERIC => nullable::<PgNumeric>(row, idx)?.map(|n| match numeric {
            NumericDecoding::Float => RowValues::Float(n.to_f64()),
            NumericDecoding::Text => RowValues::Text(n.to_decimal_string()),
        }),
        Type::BOOL => nullable::<bool>(row, idx)?.map(RowValues::Bool),
        Type::TIMESTAMP => nullable::<NaiveDateTime>(row, idx)?.map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => {
            nullable::<DateTime<Utc>>(row, idx)?.map(|v| RowValues::Timestamp(v.naive_utc()))
        }
        Type::DATE => nullable::<NaiveDate>(row, idx)?
            .map(|v| RowValues::Timestamp(v.and_time(chrono::NaiveTime::MIN))),
        Type::JSON | Type::JSONB => nullable::<Value>(row, idx)?.map(RowValues::JSON),
        Type::BYTEA => nullable::<Vec<u8>>(row, idx)?.map(RowValues::Blob),
        Type::INT2_ARRAY => array::<i16>(row, idx)?,
        Type::INT4_ARRAY => array::<i32>(row, idx)?,
        Type::INT8_ARRAY => array::<i64>(row, idx)?,
        Type::FLOAT8_ARRAY => array::<f64>(row, idx)?,
        Type::BOOL_ARRAY => array::<bool>(row, idx)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => array::<String>(row, idx)?,
        // text, varchar, bpchar, name and anything else with a text-like wire format
        _ => nullable::<String>(row, idx)?.map(RowValues::Text),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

fn nullable<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
) -> Result<Option<T>, SqlGuardError> {
    Ok(row.try_get::<_, Option<T>>(idx)?)
}

fn array<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Result<Option<RowValues>, SqlGuardError>
where
    T: FromSql<'a>,
    RowValues: From<T>,
{
    let items = nullable::<Vec<Option<T>>>(row, idx)?;
    Ok(items.map(|items| {
        RowValues::Array(
            items
                .into_iter()
                .map(|item| item.map_or(RowValues::Null, RowValues::from))
                .collect(),
        )
    }))
}
