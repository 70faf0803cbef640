use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{ColumnData, IntoSql, Row, ToSql};
use uuid::Uuid;

/// An owned SQL Server value, detached from the driver row it was read from.
///
/// Rows read from the source connection are converted into these before being
/// bulk-loaded into a staging table on the target connection. NULLs carry the
/// type they were read as, so the bulk encoder can emit a correctly typed
/// null for the staging column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(NullKind),
    Bit(bool),
    TinyInt(u8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Float(f64),
    Decimal(Decimal),
    Guid(Uuid),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
}

/// Type tag for NULL values, mirroring the [`SqlValue`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullKind {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Decimal,
    Guid,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
}

/// Probes one typed accessor; a matching column type returns either the value
/// or a typed null, a mismatched one falls through to the next probe.
macro_rules! probe {
    ($row:expr, $idx:expr, $ty:ty, $variant:ident) => {
        if let Ok(v) = $row.try_get::<$ty, _>($idx) {
            return match v {
                Some(v) => SqlValue::$variant(v.into()),
                None => SqlValue::Null(NullKind::$variant),
            };
        }
    };
}

/// Decodes a single column of a driver row into an owned [`SqlValue`].
///
/// The probing order matters: `bool` must precede the byte accessors so BIT
/// does not decode as binary, and the concrete integer widths are tried
/// narrowest-first since the driver only matches the exact wire type.
pub fn value_at(row: &Row, idx: usize) -> SqlValue {
    probe!(row, idx, bool, Bit);
    probe!(row, idx, u8, TinyInt);
    probe!(row, idx, i16, SmallInt);
    probe!(row, idx, i32, Int);
    probe!(row, idx, i64, BigInt);
    probe!(row, idx, f32, Real);
    probe!(row, idx, f64, Float);
    probe!(row, idx, Decimal, Decimal);
    probe!(row, idx, Uuid, Guid);
    probe!(row, idx, NaiveDate, Date);
    probe!(row, idx, NaiveTime, Time);
    probe!(row, idx, NaiveDateTime, DateTime);
    probe!(row, idx, DateTime<FixedOffset>, DateTimeOffset);
    probe!(row, idx, &str, Text);
    probe!(row, idx, &[u8], Bytes);

    // Exotic wire types (money, xml, sql_variant) have no matching accessor;
    // an untyped null keeps the row shape intact.
    SqlValue::Null(NullKind::Text)
}

/// Decodes every column of a driver row.
pub fn row_values(row: &Row) -> Vec<SqlValue> {
    (0..row.columns().len()).map(|idx| value_at(row, idx)).collect()
}

impl SqlValue {
    /// Converts into the driver's column data for bulk loading.
    pub fn into_sql(self) -> ColumnData<'static> {
        match self {
            SqlValue::Null(kind) => kind.into_sql(),
            SqlValue::Bit(v) => ColumnData::Bit(Some(v)),
            SqlValue::TinyInt(v) => ColumnData::U8(Some(v)),
            SqlValue::SmallInt(v) => ColumnData::I16(Some(v)),
            SqlValue::Int(v) => ColumnData::I32(Some(v)),
            SqlValue::BigInt(v) => ColumnData::I64(Some(v)),
            SqlValue::Real(v) => ColumnData::F32(Some(v)),
            SqlValue::Float(v) => ColumnData::F64(Some(v)),
            SqlValue::Decimal(v) => match v.to_sql() {
                ColumnData::Numeric(n) => ColumnData::Numeric(n),
                other => unreachable!("Decimal::to_sql produced unexpected variant: {other:?}"),
            },
            SqlValue::Guid(v) => ColumnData::Guid(Some(v)),
            SqlValue::Text(v) => ColumnData::String(Some(Cow::Owned(v))),
            SqlValue::Bytes(v) => ColumnData::Binary(Some(Cow::Owned(v))),
            SqlValue::Date(v) => v.into_sql(),
            SqlValue::Time(v) => v.into_sql(),
            SqlValue::DateTime(v) => v.into_sql(),
            SqlValue::DateTimeOffset(v) => v.into_sql(),
        }
    }
}

impl NullKind {
    fn into_sql(self) -> ColumnData<'static> {
        match self {
            NullKind::Bit => ColumnData::Bit(None),
            NullKind::TinyInt => ColumnData::U8(None),
            NullKind::SmallInt => ColumnData::I16(None),
            NullKind::Int => ColumnData::I32(None),
            NullKind::BigInt => ColumnData::I64(None),
            NullKind::Real => ColumnData::F32(None),
            NullKind::Float => ColumnData::F64(None),
            NullKind::Decimal => ColumnData::Numeric(None),
            NullKind::Guid => ColumnData::Guid(None),
            NullKind::Text => ColumnData::String(None),
            NullKind::Bytes => ColumnData::Binary(None),
            NullKind::Date => ColumnData::Date(None),
            NullKind::Time => ColumnData::Time(None),
            NullKind::DateTime => ColumnData::DateTime2(None),
            NullKind::DateTimeOffset => ColumnData::DateTimeOffset(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_values_map_to_typed_column_data() {
        assert!(matches!(
            SqlValue::Bit(true).into_sql(),
            ColumnData::Bit(Some(true))
        ));
        assert!(matches!(
            SqlValue::Int(42).into_sql(),
            ColumnData::I32(Some(42))
        ));
        assert!(matches!(
            SqlValue::BigInt(1_000_000_000).into_sql(),
            ColumnData::I64(Some(1_000_000_000))
        ));
        assert!(matches!(
            SqlValue::Float(1.5).into_sql(),
            ColumnData::F64(Some(_))
        ));
    }

    #[test]
    fn text_and_bytes_are_owned() {
        match SqlValue::Text("hello".into()).into_sql() {
            ColumnData::String(Some(cow)) => assert_eq!(&*cow, "hello"),
            other => panic!("expected string column data, got {other:?}"),
        }
        match SqlValue::Bytes(vec![0xDE, 0xAD]).into_sql() {
            ColumnData::Binary(Some(cow)) => assert_eq!(&*cow, &[0xDE, 0xAD]),
            other => panic!("expected binary column data, got {other:?}"),
        }
    }

    #[test]
    fn nulls_keep_their_wire_type() {
        assert!(matches!(
            SqlValue::Null(NullKind::Int).into_sql(),
            ColumnData::I32(None)
        ));
        assert!(matches!(
            SqlValue::Null(NullKind::Text).into_sql(),
            ColumnData::String(None)
        ));
        assert!(matches!(
            SqlValue::Null(NullKind::DateTime).into_sql(),
            ColumnData::DateTime2(None)
        ));
    }

    #[test]
    fn guid_round_trips_as_guid() {
        let id = Uuid::new_v4();
        assert!(matches!(
            SqlValue::Guid(id).into_sql(),
            ColumnData::Guid(Some(v)) if v == id
        ));
    }
}
