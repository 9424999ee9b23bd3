//! Typed rows and the schemas that describe them

use crate::error::{QueryDiffError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Logical type of a result column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer,
    UnsignedInteger,
    HugeInt,
    /// Fixed point `DECIMAL(width, scale)`, kept exact
    Decimal,
    Float,
    Text,
    Blob,
    Date,
    Time,
    Timestamp,
    /// Any type without a native mapping; values are carried as text and
    /// never used for ordering
    Other(String),
}

impl ColumnType {
    /// Map a DuckDB type name (as printed by `DESCRIBE`) to a column type
    pub fn from_duckdb(type_name: &str) -> Self {
        let upper = type_name.trim().to_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();

        match base {
            "BOOLEAN" | "BOOL" => Self::Boolean,
            "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" => Self::Integer,
            "UTINYINT" | "USMALLINT" | "UINTEGER" | "UBIGINT" => Self::UnsignedInteger,
            "HUGEINT" => Self::HugeInt,
            "DECIMAL" | "NUMERIC" => Self::Decimal,
            "FLOAT" | "REAL" | "DOUBLE" => Self::Float,
            "VARCHAR" | "TEXT" | "STRING" => Self::Text,
            "BLOB" | "BYTEA" => Self::Blob,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" | "DATETIME" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS" => {
                Self::Timestamp
            }
            _ => Self::Other(type_name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "BIGINT",
            Self::UnsignedInteger => "UBIGINT",
            Self::HugeInt => "HUGEINT",
            Self::Decimal => "DECIMAL",
            Self::Float => "DOUBLE",
            Self::Text => "VARCHAR",
            Self::Blob => "BLOB",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    UInt(u64),
    HugeInt(i128),
    Decimal(Decimal),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Days since 1970-01-01
    Date(i32),
    /// Microseconds since midnight
    Time(i64),
    /// Microseconds since the Unix epoch
    Timestamp(i64),
}

enum Numeric {
    Int(i128),
    Decimal(Decimal),
    Float(f64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value may be stored in a column of the given type
    pub fn conforms_to(&self, column_type: &ColumnType) -> bool {
        match (self, column_type) {
            (Self::Null, _) => true,
            (_, ColumnType::Other(_)) => true,
            (Self::Boolean(_), ColumnType::Boolean) => true,
            (Self::Int(_), ColumnType::Integer) => true,
            (Self::UInt(_), ColumnType::UnsignedInteger) => true,
            (Self::HugeInt(_), ColumnType::HugeInt) => true,
            (Self::Decimal(_), ColumnType::Decimal) => true,
            (Self::Float(_), ColumnType::Float) => true,
            (Self::Text(_), ColumnType::Text) => true,
            (Self::Blob(_), ColumnType::Blob) => true,
            (Self::Date(_), ColumnType::Date) => true,
            (Self::Time(_), ColumnType::Time) => true,
            (Self::Timestamp(_), ColumnType::Timestamp) => true,
            _ => false,
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        match self {
            Self::Int(v) => Some(Numeric::Int(i128::from(*v))),
            Self::UInt(v) => Some(Numeric::Int(i128::from(*v))),
            Self::HugeInt(v) => Some(Numeric::Int(*v)),
            Self::Decimal(v) => Some(Numeric::Decimal(*v)),
            Self::Float(v) => Some(Numeric::Float(*v)),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Int(_) | Self::UInt(_) | Self::HugeInt(_) | Self::Decimal(_) | Self::Float(_) => {
                "NUMERIC"
            }
            Self::Text(_) => "VARCHAR",
            Self::Blob(_) => "BLOB",
            Self::Date(_) => "DATE",
            Self::Time(_) => "TIME",
            Self::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Compare two non-null values of the same column for sorting.
    ///
    /// Numbers compare across integer widths, decimals and floats; integers
    /// and decimals compare exactly. Text and blobs compare bytewise. Nulls
    /// are placed by the caller.
    pub fn sort_cmp(&self, other: &Value) -> Result<Ordering> {
        if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
            return Ok(a.cmp(&b));
        }

        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => Ok(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            (Self::Blob(a), Self::Blob(b)) => Ok(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Ok(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Ok(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Ok(a.cmp(b)),
            _ => Err(QueryDiffError::invalid_input(format!(
                "cannot compare {} value with {} value",
                self.kind(),
                other.kind()
            ))),
        }
    }
}

impl Numeric {
    fn cmp(&self, other: &Numeric) -> Ordering {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => a.cmp(b),
            (Numeric::Decimal(a), Numeric::Decimal(b)) => a.cmp(b),
            (Numeric::Int(a), Numeric::Decimal(b)) => match Decimal::try_from_i128_with_scale(*a, 0) {
                Ok(a) => a.cmp(b),
                Err(_) => cmp_f64(*a as f64, b.to_f64().unwrap_or(f64::NAN)),
            },
            (Numeric::Decimal(_), Numeric::Int(_)) => other.cmp(self).reverse(),
            (Numeric::Float(a), Numeric::Float(b)) => cmp_f64(*a, *b),
            (Numeric::Float(a), other) => cmp_f64(*a, other.to_f64()),
            (_, Numeric::Float(b)) => cmp_f64(self.to_f64(), *b),
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Numeric::Int(v) => *v as f64,
            Numeric::Decimal(v) => v.to_f64().unwrap_or(f64::NAN),
            Numeric::Float(v) => *v,
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::HugeInt(a), Self::HugeInt(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            // NaN must equal itself or identical rows would never cancel
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::UInt(i) => write!(f, "{}", i),
            Self::HugeInt(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Blob(bytes) => {
                f.write_str("\\x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Self::Date(days) => match NaiveDate::from_num_days_from_ce_opt(
                days.saturating_add(UNIX_EPOCH_DAYS_FROM_CE),
            ) {
                Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
                None => write!(f, "{}", days),
            },
            Self::Time(micros) => {
                let secs = micros.div_euclid(1_000_000);
                let nanos = micros.rem_euclid(1_000_000) * 1_000;
                match u32::try_from(secs).ok().and_then(|secs| {
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos as u32)
                }) {
                    Some(time) => write!(f, "{}", time.format("%H:%M:%S%.f")),
                    None => write!(f, "{}", micros),
                }
            }
            Self::Timestamp(micros) => match DateTime::from_timestamp_micros(*micros) {
                Some(ts) => write!(f, "{}", ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f")),
                None => write!(f, "{}", micros),
            },
        }
    }
}

/// Column descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Stable identifier, unique within a schema
    pub tag: u64,
    pub col_type: ColumnType,
    pub is_primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, tag: u64, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            tag,
            col_type,
            is_primary_key: false,
        }
    }
}

/// Ordered column layout of a row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Schema of a query result: tags follow column order and the first
    /// column is flagged as the primary key.
    pub fn for_result(columns: Vec<(String, ColumnType)>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(i, (name, col_type))| Column {
                name,
                tag: i as u64,
                col_type,
                is_primary_key: i == 0,
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Same names and tags with every column typed as text
    pub fn to_untyped(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                tag: c.tag,
                col_type: ColumnType::Text,
                is_primary_key: c.is_primary_key,
            })
            .collect();
        Self { columns }
    }

    /// Human readable column list used in mismatch diagnostics
    pub fn describe(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.col_type))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.name == b.name && a.tag == b.tag && a.col_type == b.col_type)
    }
}

/// Immutable tuple of values bound to one schema
#[derive(Debug, Clone)]
pub struct Row {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row, checking arity and value types against the schema
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(QueryDiffError::row_conversion(format!(
                "row has {} values but schema has {} columns",
                values.len(),
                schema.len()
            )));
        }

        for (value, column) in values.iter().zip(schema.columns()) {
            if !value.conforms_to(&column.col_type) {
                return Err(QueryDiffError::row_conversion(format!(
                    "value '{}' is not valid for column '{}' of type {}",
                    value, column.name, column.col_type
                )));
            }
        }

        Ok(Self { schema, values })
    }

    /// Row with every column null
    pub fn nulls(schema: Arc<Schema>) -> Self {
        let values = vec![Value::Null; schema.len()];
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value-wise equality across all columns
    pub fn values_equal(&self, other: &Row) -> bool {
        self.values == other.values
    }

    /// Re-bind this row's values to another schema of the same shape
    pub fn convert_to(&self, schema: &Arc<Schema>) -> Result<Row> {
        Row::new(Arc::clone(schema), self.values.clone())
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        *self.schema == *other.schema && self.values_equal(other)
    }
}
