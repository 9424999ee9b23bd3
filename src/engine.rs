//! Query execution against DuckDB databases

use crate::error::{QueryDiffError, Result};
use crate::ordering::sort_keys_for_query;
use crate::row::{ColumnType, Row, Schema, Value};
use crate::source::{comparator_for_keys, RowComparator, RowSource};
use crossbeam_channel::{bounded, Receiver, Sender};
use duckdb::types::ValueRef;
use duckdb::{AccessMode, Config, Connection};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Rows read ahead of the consumer per query
const ROW_READ_AHEAD: usize = 256;

/// Result of running a query: its schema and a stream of its rows
pub struct QueryResult {
    pub schema: Arc<Schema>,
    pub rows: Box<dyn RowSource>,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("schema", &self.schema.describe())
            .finish()
    }
}

/// Runs SQL against one dataset snapshot
pub trait QueryEngine {
    fn execute_query(&self, query: &str) -> Result<QueryResult>;

    /// Human readable execution plan of `query`
    fn describe_plan(&self, query: &str) -> Result<String>;
}

/// DuckDB-backed query engine
pub struct DuckDbEngine {
    connection: Connection,
    location: Option<PathBuf>,
}

impl DuckDbEngine {
    /// Open a database file read-only
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QueryDiffError::workspace(format!(
                "database file not found: {}",
                path.display()
            )));
        }
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        let connection = Connection::open_with_flags(path, config)?;
        log::debug!("opened {} read-only", path.display());
        Ok(Self {
            connection,
            location: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            connection: Connection::open_in_memory()?,
            location: None,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Result schema of `query`, from `DESCRIBE`
    pub fn describe_query(&self, query: &str) -> Result<Arc<Schema>> {
        let mut stmt = self
            .connection
            .prepare(&format!("DESCRIBE {}", query))
            .map_err(|e| QueryDiffError::query(format!("Failed to describe query: {}", e)))?;

        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let type_name: String = row.get(1)?;
                Ok((name, ColumnType::from_duckdb(&type_name)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Arc::new(Schema::for_result(columns)))
    }
}

impl fmt::Debug for DuckDbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuckDbEngine")
            .field("location", &self.location)
            .finish()
    }
}

impl QueryEngine for DuckDbEngine {
    fn execute_query(&self, query: &str) -> Result<QueryResult> {
        let query = normalize_query(query);
        let schema = self.describe_query(query)?;

        // the producer runs on its own connection to the same database
        let connection = self.connection.try_clone()?;
        let rows = DuckDbRowSource::spawn(connection, query.to_string(), Arc::clone(&schema))?;

        Ok(QueryResult {
            schema,
            rows: Box::new(rows),
        })
    }

    fn describe_plan(&self, query: &str) -> Result<String> {
        let query = normalize_query(query);
        let mut stmt = self.connection.prepare(&format!("EXPLAIN {}", query))?;
        let lines = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }
}

fn normalize_query(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

/// Rows of one query, read by a producer thread through a bounded channel
pub struct DuckDbRowSource {
    query: String,
    rows: Option<Receiver<Result<Row>>>,
    producer: Option<JoinHandle<()>>,
}

impl DuckDbRowSource {
    fn spawn(connection: Connection, query: String, schema: Arc<Schema>) -> Result<Self> {
        let (tx, rx) = bounded(ROW_READ_AHEAD);
        let producer_query = query.clone();
        let producer = std::thread::Builder::new()
            .name("duckdb-rows".to_string())
            .spawn(move || produce_rows(connection, &producer_query, schema, tx))?;

        Ok(Self {
            query,
            rows: Some(rx),
            producer: Some(producer),
        })
    }

    fn join_producer(&mut self) -> Result<()> {
        match self.producer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| QueryDiffError::query("row reader thread panicked")),
            None => Ok(()),
        }
    }
}

impl RowSource for DuckDbRowSource {
    fn next_row(&mut self) -> Result<Option<Row>> {
        let Some(rows) = &self.rows else {
            return Ok(None);
        };
        match rows.recv() {
            Ok(Ok(row)) => Ok(Some(row)),
            Ok(Err(e)) => {
                self.rows = None;
                Err(e)
            }
            Err(_) => {
                // producer hung up: either done or dead
                self.rows = None;
                self.join_producer()?;
                Ok(None)
            }
        }
    }

    fn row_comparator(&self, schema: &Schema) -> Result<Option<RowComparator>> {
        match sort_keys_for_query(&self.query, schema) {
            Some(keys) => comparator_for_keys(schema, keys).map(Some),
            None => Ok(None),
        }
    }
}

impl Drop for DuckDbRowSource {
    fn drop(&mut self) {
        // hanging up first makes a blocked producer give up
        self.rows = None;
        if let Err(e) = self.join_producer() {
            log::warn!("{}", e);
        }
    }
}

fn produce_rows(connection: Connection, query: &str, schema: Arc<Schema>, tx: Sender<Result<Row>>) {
    let result = (|| -> Result<u64> {
        let mut stmt = connection.prepare(query)?;
        let mut rows = stmt.query([])?;
        let mut produced = 0u64;

        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(schema.len());
            for (i, column) in schema.columns().iter().enumerate() {
                values.push(coerce(value_from_ref(row.get_ref(i)?), &column.col_type));
            }
            let row = Row::new(Arc::clone(&schema), values)?;
            if tx.send(Ok(row)).is_err() {
                // consumer went away
                break;
            }
            produced += 1;
        }
        Ok(produced)
    })();

    match result {
        Ok(produced) => log::debug!("read {} rows", produced),
        Err(e) => {
            let _ = tx.send(Err(e));
        }
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Boolean(b),
        ValueRef::TinyInt(i) => Value::Int(i64::from(i)),
        ValueRef::SmallInt(i) => Value::Int(i64::from(i)),
        ValueRef::Int(i) => Value::Int(i64::from(i)),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::HugeInt(i) => Value::HugeInt(i),
        ValueRef::UTinyInt(i) => Value::UInt(u64::from(i)),
        ValueRef::USmallInt(i) => Value::UInt(u64::from(i)),
        ValueRef::UInt(i) => Value::UInt(u64::from(i)),
        ValueRef::UBigInt(i) => Value::UInt(i),
        ValueRef::Float(f) => Value::Float(f64::from(f)),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => Value::Decimal(d),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        ValueRef::Date32(d) => Value::Date(d),
        ValueRef::Time64(unit, t) => Value::Time(unit.to_micros(t)),
        ValueRef::Timestamp(unit, ts) => Value::Timestamp(unit.to_micros(ts)),
        other => Value::Text(format!("{:?}", other)),
    }
}

/// Widen a value to the kind its column declares where that is lossless
fn coerce(value: Value, column_type: &ColumnType) -> Value {
    match (value, column_type) {
        (Value::Int(i), ColumnType::HugeInt) => Value::HugeInt(i128::from(i)),
        (Value::UInt(i), ColumnType::HugeInt) => Value::HugeInt(i128::from(i)),
        (Value::Int(i), ColumnType::Float) => Value::Float(i as f64),
        (Value::UInt(i), ColumnType::Integer) if i64::try_from(i).is_ok() => Value::Int(i as i64),
        (Value::Int(i), ColumnType::UnsignedInteger) if i >= 0 => Value::UInt(i as u64),
        (Value::Blob(b), ColumnType::Text) => Value::Text(String::from_utf8_lossy(&b).to_string()),
        (value, _) => value,
    }
}
