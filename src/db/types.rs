//! Backend-agnostic value decoding.
//!
//! Rows from any backend decode into [`ColumnValue`], the single value type
//! the formatter understands. Decoding is two-phase: [`categorize_type`]
//! classifies the column's declared type, then a database-specific decoder
//! extracts the value for that category.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

use crate::db::DatabaseType;

/// A single decoded cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Timestamp,
    Text,
}

/// Classify a declared column type into a decoding category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity stores floats
        if db == DatabaseType::Sqlite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }
    if lower.contains("timestamp") || lower == "datetime" {
        return TypeCategory::Timestamp;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    TypeCategory::Text
}

/// Wrapper decoding DECIMAL/NUMERIC values as their exact string form, so
/// precision is never lost to a float conversion.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Conversion from a backend row to column names and decoded values.
pub trait DecodeRow {
    fn column_names(&self) -> Vec<String>;
    fn decode_values(&self) -> Vec<ColumnValue>;
}

impl DecodeRow for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> Vec<ColumnValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::Postgres);
                postgres::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl DecodeRow for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> Vec<ColumnValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySql);
                mysql::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl DecodeRow for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn decode_values(&self) -> Vec<ColumnValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::Sqlite);
                sqlite::decode_column(self, idx, category)
            })
            .collect()
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> ColumnValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Text(v.0),
            _ => ColumnValue::Null,
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> ColumnValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return ColumnValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return ColumnValue::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return ColumnValue::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return ColumnValue::Int(v);
        }
        ColumnValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<bool>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Bool(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_float(row: &PgRow, idx: usize) -> ColumnValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return ColumnValue::Float(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return ColumnValue::Float(v as f64);
        }
        ColumnValue::Null
    }

    fn decode_binary(row: &PgRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Binary(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> ColumnValue {
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return ColumnValue::Timestamp(v);
        }
        // TIMESTAMP WITHOUT TIME ZONE, treated as UTC
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return ColumnValue::Timestamp(v.and_utc());
        }
        ColumnValue::Null
    }

    fn decode_text(row: &PgRow, idx: usize) -> ColumnValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return ColumnValue::Text(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return ColumnValue::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return ColumnValue::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
            return ColumnValue::Text(v.to_string());
        }
        ColumnValue::Null
    }
}

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> ColumnValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Text(v.0),
            _ => ColumnValue::Null,
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> ColumnValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return ColumnValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return ColumnValue::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return ColumnValue::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return ColumnValue::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return ColumnValue::Int(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return ColumnValue::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            // Values above i64::MAX keep their exact text form
            return i64::try_from(v)
                .map(ColumnValue::Int)
                .unwrap_or_else(|_| ColumnValue::Text(v.to_string()));
        }
        ColumnValue::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<bool>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Bool(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> ColumnValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return ColumnValue::Float(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return ColumnValue::Float(v as f64);
        }
        ColumnValue::Null
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Binary(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_timestamp(row: &MySqlRow, idx: usize) -> ColumnValue {
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return ColumnValue::Timestamp(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return ColumnValue::Timestamp(v.and_utc());
        }
        ColumnValue::Null
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> ColumnValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return ColumnValue::Text(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return ColumnValue::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return ColumnValue::Text(v.to_string());
        }
        ColumnValue::Null
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> ColumnValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<i64>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Int(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<bool>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Bool(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<f64>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Float(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> ColumnValue {
        match row.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(v)) => ColumnValue::Binary(v),
            _ => ColumnValue::Null,
        }
    }

    fn decode_timestamp(row: &SqliteRow, idx: usize) -> ColumnValue {
        // SQLite stores timestamps as text or numbers depending on the writer
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return ColumnValue::Timestamp(v.and_utc());
        }
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return ColumnValue::Text(v);
        }
        ColumnValue::Null
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> ColumnValue {
        // A SQLite column's declared type does not constrain its values, so
        // fall through the storage classes in order.
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return ColumnValue::Text(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return ColumnValue::Int(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return ColumnValue::Float(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return ColumnValue::Binary(v);
        }
        ColumnValue::Null
    }
}
