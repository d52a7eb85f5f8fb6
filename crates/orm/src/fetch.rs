use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::any::{Any, AnyTypeInfoKind};
use sqlx::{Decode, Row as _, Type, ValueRef as _};

use crate::Row;

/// Trait for types that can be extracted from database rows.
///
/// Implemented for the standard Rust types an entity field is likely to use
/// (`i64`, `String`, `DateTime<Utc>`, ...). Temporal and JSON values are read
/// from text columns, booleans also from integer columns.
pub trait FetchValue: Sized {
    /// Fetch a value from a row by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or the value cannot be converted to the target type.
    fn fetch(row: &Row, col: &str) -> Result<Self>;
}

/// Whether `row` carries a column named `col`.
#[must_use]
pub fn has_column(row: &Row, col: &str) -> bool {
    row.try_column(col).is_ok()
}

fn decode<'r, T>(row: &'r Row, col: &str) -> Result<T>
where
    T: Decode<'r, Any> + Type<Any>,
{
    row.try_get::<T, _>(col).map_err(|err| match err {
        sqlx::Error::ColumnNotFound(_) => anyhow!("missing column '{col}'"),
        err => anyhow!(err).context(format!("decoding column '{col}'")),
    })
}

fn kind(row: &Row, col: &str) -> Result<Option<AnyTypeInfoKind>> {
    let value = row.try_get_raw(col).map_err(|err| match err {
        sqlx::Error::ColumnNotFound(_) => anyhow!("missing column '{col}'"),
        err => anyhow!(err),
    })?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(value.type_info().kind()))
}

impl FetchValue for bool {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        match kind(row, col)? {
            Some(AnyTypeInfoKind::Bool) => decode(row, col),
            Some(k) if k.is_integer() => Ok(decode::<i64>(row, col)? != 0),
            _ => bail!("expected boolean in column '{col}'"),
        }
    }
}

impl FetchValue for i32 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        decode(row, col)
    }
}

impl FetchValue for i64 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        decode(row, col)
    }
}

impl FetchValue for u32 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        let value: i64 = decode(row, col)?;
        Self::try_from(value).map_err(|e| anyhow!("column '{col}' out of range for u32: {e}"))
    }
}

impl FetchValue for u64 {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        let value: i64 = decode(row, col)?;
        Self::try_from(value).map_err(|e| anyhow!("column '{col}' out of range for u64: {e}"))
    }
}

impl FetchValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        Ok(f64::fetch(row, col)? as Self)
    }
}

impl FetchValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        match kind(row, col)? {
            Some(k) if k.is_integer() => Ok(decode::<i64>(row, col)? as Self),
            _ => decode(row, col),
        }
    }
}

impl FetchValue for String {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        decode(row, col)
    }
}

impl FetchValue for Vec<u8> {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        decode(row, col)
    }
}

impl FetchValue for DateTime<Utc> {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        let raw: String = decode(row, col)?;
        parse_timestamp(&raw)
    }
}

impl FetchValue for NaiveDate {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        let raw: String = decode(row, col)?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_e| anyhow!("unsupported date: {raw}; expected \"%Y-%m-%d\" format"))
    }
}

impl FetchValue for serde_json::Value {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        match kind(row, col)? {
            Some(AnyTypeInfoKind::Blob) => Ok(serde_json::from_slice(&decode::<Vec<u8>>(row, col)?)?),
            Some(AnyTypeInfoKind::Text) => Ok(serde_json::from_str(&decode::<String>(row, col)?)?),
            _ => bail!("expected json compatible value in column '{col}'"),
        }
    }
}

impl<T: FetchValue> FetchValue for Option<T> {
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        match kind(row, col)? {
            Some(_) => Ok(Some(T::fetch(row, col)?)),
            None => Ok(None),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
    }
    bail!("unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format")
}
