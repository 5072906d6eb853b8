use std::error::Error;
use std::fmt::Write as _;

use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes::BytesMut;

const SIGN_POSITIVE: u16 = 0x0000;
const SIGN_NEGATIVE: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_POS_INF: u16 = 0xD000;
const SIGN_NEG_INF: u16 = 0xF000;
const NBASE: f64 = 10_000.0;
const DEC_DIGITS: usize = 4;

/// A `numeric` value in the server's binary wire format: base-10000 digit groups, the
/// weight of the first group, a sign word and the display scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgNumeric {
    digits: Vec<i16>,
    weight: i16,
    sign: u16,
    scale: u16,
}

impl PgNumeric {
    /// Nearest `f64`; `NaN` and the infinities map to their float counterparts.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        match self.sign {
            SIGN_NAN => return f64::NAN,
            SIGN_POS_INF => return f64::INFINITY,
            SIGN_NEG_INF => return f64::NEG_INFINITY,
            _ => {}
        }
        let mut value = 0.0;
        for (i, digit) in self.digits.iter().enumerate() {
            let exponent = i32::from(self.weight) - i32::try_from(i).unwrap_or(i32::MAX);
            value += f64::from(*digit) * NBASE.powi(exponent);
        }
        if self.sign == SIGN_NEGATIVE { -value } else { value }
    }

    /// Exact decimal text with `scale` fractional digits, as `numeric_out` prints it.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        match self.sign {
            SIGN_NAN => return "NaN".to_string(),
            SIGN_POS_INF => return "Infinity".to_string(),
            SIGN_NEG_INF => return "-Infinity".to_string(),
            _ => {}
        }

        let weight = i32::from(self.weight);
        let mut out = String::new();
        if self.sign == SIGN_NEGATIVE {
            out.push('-');
        }

        if weight < 0 {
            out.push('0');
        } else {
            for group in 0..=weight {
                let digit = self.digit_at(group);
                if group == 0 {
                    let _ = write!(out, "{digit}");
                } else {
                    let _ = write!(out, "{digit:04}");
                }
            }
        }

        let scale = usize::from(self.scale);
        if scale > 0 {
            let mut fraction = String::with_capacity(scale + 4);
            let mut group = weight + 1;
            while fraction.len() < scale {
                let _ = write!(fraction, "{:04}", self.digit_at(group));
                group += 1;
            }
            fraction.truncate(scale);
            out.push('.');
            out.push_str(&fraction);
        }
        out
    }

    /// Parse decimal text such as `-12.50`, `1.5e3`, `NaN` or `Infinity`.
    ///
    /// # Errors
    /// Returns an error when the text is not a decimal number or does not fit the wire
    /// format.
    pub fn parse_decimal(text: &str) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let text = text.trim();
        let invalid = || -> Box<dyn Error + Sync + Send> {
            format!("invalid input syntax for type numeric: {text:?}").into()
        };

        match text.to_ascii_lowercase().as_str() {
            "nan" => return Ok(Self::special(SIGN_NAN)),
            "infinity" | "+infinity" | "inf" | "+inf" => return Ok(Self::special(SIGN_POS_INF)),
            "-infinity" | "-inf" => return Ok(Self::special(SIGN_NEG_INF)),
            _ => {}
        }

        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(at) => (
                &unsigned[..at],
                unsigned[at + 1..].parse::<i32>().map_err(|_| invalid())?,
            ),
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if (int_part.is_empty() && frac_part.is_empty())
            || !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let int_len = i32::try_from(int_part.len()).map_err(|_| invalid())?;
        let frac_len = i32::try_from(frac_part.len()).map_err(|_| invalid())?;
        let scale = u16::try_from(frac_len.saturating_sub(exponent).max(0))
            .map_err(|_| "numeric scale out of range")?;

        // decimal digits, with `point` digits before the decimal point
        let mut digits: Vec<u8> = int_part.bytes().chain(frac_part.bytes()).map(|b| b - b'0').collect();
        let mut point = int_len.checked_add(exponent).ok_or_else(invalid)?;
        let leading = digits.iter().take_while(|d| **d == 0).count();
        digits.drain(..leading);
        point -= i32::try_from(leading).map_err(|_| invalid())?;
        while digits.last() == Some(&0) {
            digits.pop();
        }
        if digits.is_empty() {
            return Ok(Self {
                digits: Vec::new(),
                weight: 0,
                sign: SIGN_POSITIVE,
                scale,
            });
        }

        // group boundaries sit on multiples of four decimal places
        let top_exponent = point - 1;
        let weight = top_exponent.div_euclid(4);
        let pad = usize::try_from(weight * 4 + 3 - top_exponent).map_err(|_| invalid())?;
        let mut aligned = vec![0u8; pad];
        aligned.extend_from_slice(&digits);
        aligned.resize(aligned.len().div_ceil(DEC_DIGITS) * DEC_DIGITS, 0);

        let groups = aligned
            .chunks(DEC_DIGITS)
            .map(|chunk| chunk.iter().fold(0i16, |acc, d| acc * 10 + i16::from(*d)))
            .collect::<Vec<_>>();
        i16::try_from(groups.len()).map_err(|_| "numeric value has too many digits")?;

        Ok(Self {
            digits: groups,
            weight: i16::try_from(weight).map_err(|_| "numeric weight out of range")?,
            sign: if negative { SIGN_NEGATIVE } else { SIGN_POSITIVE },
            scale,
        })
    }

    /// Shortest decimal form of `value` that reads back as the same `f64`.
    ///
    /// # Errors
    /// Returns an error only if the printed value does not fit the wire format.
    pub fn from_f64(value: f64) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if value.is_nan() {
            Ok(Self::special(SIGN_NAN))
        } else if value.is_infinite() {
            Ok(Self::special(if value > 0.0 { SIGN_POS_INF } else { SIGN_NEG_INF }))
        } else {
            Self::parse_decimal(&value.to_string())
        }
    }

    fn special(sign: u16) -> Self {
        Self {
            digits: Vec::new(),
            weight: 0,
            sign,
            scale: 0,
        }
    }

    fn digit_at(&self, group: i32) -> i16 {
        usize::try_from(group)
            .ok()
            .and_then(|idx| self.digits.get(idx).copied())
            .unwrap_or(0)
    }

    fn parse(raw: &[u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let word = |at: usize| -> Result<[u8; 2], Box<dyn Error + Sync + Send>> {
            raw.get(at..at + 2)
                .and_then(|bytes| bytes.try_into().ok())
                .ok_or_else(|| "numeric value is truncated".into())
        };

        let ndigits = usize::try_from(i16::from_be_bytes(word(0)?))
            .map_err(|_| "numeric value has a negative digit count")?;
        let weight = i16::from_be_bytes(word(2)?);
        let sign = u16::from_be_bytes(word(4)?);
        let scale = u16::from_be_bytes(word(6)?);
        if !matches!(
            sign,
            SIGN_POSITIVE | SIGN_NEGATIVE | SIGN_NAN | SIGN_POS_INF | SIGN_NEG_INF
        ) {
            return Err(format!("numeric value has an unknown sign word {sign:#06x}").into());
        }

        let digits = (0..ndigits)
            .map(|i| word(8 + i * 2).map(i16::from_be_bytes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            digits,
            weight,
            sign,
            scale,
        })
    }
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::parse(raw)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

impl From<i64> for PgNumeric {
    fn from(value: i64) -> Self {
        let mut magnitude = value.unsigned_abs();
        let mut groups = Vec::new();
        while magnitude > 0 {
            // always below 10_000
            groups.push(i16::try_from(magnitude % 10_000).unwrap_or_default());
            magnitude /= 10_000;
        }
        let weight = i16::try_from(groups.len()).unwrap_or(1) - 1;
        groups.reverse();
        while groups.last() == Some(&0) {
            groups.pop();
        }
        Self {
            weight: if groups.is_empty() { 0 } else { weight },
            digits: groups,
            sign: if value < 0 { SIGN_NEGATIVE } else { SIGN_POSITIVE },
            scale: 0,
        }
    }
}

impl ToSql for PgNumeric {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(&i16::try_from(self.digits.len())?.to_be_bytes());
        out.extend_from_slice(&self.weight.to_be_bytes());
        out.extend_from_slice(&self.sign.to_be_bytes());
        out.extend_from_slice(&self.scale.to_be_bytes());
        for digit in &self.digits {
            out.extend_from_slice(&digit.to_be_bytes());
        }
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }

    to_sql_checked!();
}
