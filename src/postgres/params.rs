use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::types::RowValues;

use super::numeric::PgNumeric;

/// Borrowed driver parameters for one execution.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        let references = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Params { references }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

impl ToSql for RowValues {
    // The server picks each parameter's type and reads our bytes as that type's binary
    // format, so every variant either converts to the parameter type or is refused.
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::INT8 => i.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 | Type::FLOAT8 => {
                    #[allow(clippy::cast_precision_loss)]
                    let f = *i as f64;
                    RowValues::Float(f).to_sql(ty, out)
                }
                Type::NUMERIC => PgNumeric::from(*i).to_sql(ty, out),
                _ if is_text(ty) => i.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Float(f) => match *ty {
                #[allow(clippy::cast_possible_truncation)]
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::NUMERIC => PgNumeric::from_f64(*f)?.to_sql(ty, out),
                _ if is_text(ty) => f.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Text(s) => text_to_sql(s, ty, out),
            RowValues::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMP => dt.to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                _ if is_text(ty) => dt.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::JSON(value) => match *ty {
                Type::JSON | Type::JSONB => value.to_sql(ty, out),
                _ if is_text(ty) => value.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Blob(bytes) => match *ty {
                Type::BYTEA => bytes.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            RowValues::Array(items) => {
                if !matches!(ty.kind(), Kind::Array(_)) {
                    return Err(format!("array value bound to non-array parameter of type {ty}").into());
                }
                items.to_sql(ty, out)
            }
        }
    }

    fn accepts(ty: &Type) -> bool {
        match ty.kind() {
            Kind::Array(member) => Self::accepts(member),
            _ => {
                is_text(ty)
                    || matches!(
                        *ty,
                        Type::INT2
                            | Type::INT4
                            | Type::INT8
                            | Type::OID
                            | Type::FLOAT4
                            | Type::FLOAT8
                            | Type::NUMERIC
                            | Type::BOOL
                            | Type::TIMESTAMP
                            | Type::TIMESTAMPTZ
                            | Type::DATE
                            | Type::JSON
                            | Type::JSONB
                            | Type::BYTEA
                            | Type::UUID
                    )
            }
        }
    }

    to_sql_checked!();
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn mismatch(value: &RowValues, ty: &Type) -> Box<dyn Error + Sync + Send> {
    let variant = match value {
        RowValues::Int(_) => "Int",
        RowValues::Float(_) => "Float",
        RowValues::Text(_) => "Text",
        RowValues::Bool(_) => "Bool",
        RowValues::Timestamp(_) => "Timestamp",
        RowValues::Null => "Null",
        RowValues::JSON(_) => "JSON",
        RowValues::Blob(_) => "Blob",
        RowValues::Array(_) => "Array",
    };
    format!("cannot bind a {variant} value to a parameter of type {ty}").into()
}

/// Text is parsed into the parameter type, the way the server parses a text-format
/// parameter.
fn text_to_sql(
    s: &str,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    let invalid = || -> Box<dyn Error + Sync + Send> {
        format!("invalid input syntax for type {ty}: {s:?}").into()
    };
    let trimmed = s.trim();
    match *ty {
        _ if is_text(ty) => s.to_sql(ty, out),
        Type::INT2 => trimmed.parse::<i16>().map_err(|_| invalid())?.to_sql(ty, out),
        Type::INT4 => trimmed.parse::<i32>().map_err(|_| invalid())?.to_sql(ty, out),
        Type::INT8 => trimmed.parse::<i64>().map_err(|_| invalid())?.to_sql(ty, out),
        Type::OID => trimmed.parse::<u32>().map_err(|_| invalid())?.to_sql(ty, out),
        Type::FLOAT4 => trimmed.parse::<f32>().map_err(|_| invalid())?.to_sql(ty, out),
        Type::FLOAT8 => trimmed.parse::<f64>().map_err(|_| invalid())?.to_sql(ty, out),
        Type::NUMERIC => PgNumeric::parse_decimal(trimmed)?.to_sql(ty, out),
        Type::BOOL => parse_bool(trimmed).ok_or_else(invalid)?.to_sql(ty, out),
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => RowValues::Timestamp(
            parse_timestamp(trimmed).ok_or_else(invalid)?,
        )
        .to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)
            .map_err(|_| invalid())?
            .to_sql(ty, out),
        Type::UUID => {
            out.extend_from_slice(&parse_uuid(trimmed).ok_or_else(invalid)?);
            Ok(IsNull::No)
        }
        _ => Err(format!("cannot bind a Text value to a parameter of type {ty}").into()),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Offsets are folded into UTC; text without one is taken as UTC.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let s = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')).unwrap_or(s);
    let hex: Vec<u8> = s.bytes().filter(|b| *b != b'-').collect();
    if hex.len() != 32 || !hex.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let mut uuid = [0u8; 16];
    for (byte, pair) in uuid.iter_mut().zip(hex.chunks(2)) {
        let pair = std::str::from_utf8(pair).ok()?;
        *byte = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(uuid)
}
