//! Combine same-shaped rows from named sides into one side-by-side row

use crate::error::{QueryDiffError, Result};
use crate::row::{Column, Row, Schema, Value};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Logical name of the older side of a diff
pub const FROM: &str = "from";
/// Logical name of the newer side of a diff
pub const TO: &str = "to";

/// Renames a column of one side for the joined schema
pub type ColNamingFn = fn(&str) -> String;

pub fn from_namer(name: &str) -> String {
    format!("from_{}", name)
}

pub fn to_namer(name: &str) -> String {
    format!("to_{}", name)
}

/// A schema together with the side it belongs to
#[derive(Debug, Clone)]
pub struct NamedSchema {
    pub name: String,
    pub schema: Arc<Schema>,
}

impl NamedSchema {
    pub fn new(name: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Joins rows of several named schemas into rows of one combined schema
#[derive(Debug, Clone)]
pub struct Joiner {
    joined: Arc<Schema>,
    schemas: IndexMap<String, Arc<Schema>>,
    /// First joined column index for each side
    offsets: IndexMap<String, usize>,
}

impl Joiner {
    pub fn new(named: Vec<NamedSchema>, namers: HashMap<String, ColNamingFn>) -> Result<Self> {
        let Some(first) = named.first() else {
            return Err(QueryDiffError::join("no schemas to join"));
        };
        let reference = Arc::clone(&first.schema);

        let mut schemas = IndexMap::new();
        for ns in &named {
            if schemas.contains_key(&ns.name) {
                return Err(QueryDiffError::join(format!(
                    "schema name '{}' given more than once",
                    ns.name
                )));
            }
            check_compatible(&reference, &ns.schema, &first.name, &ns.name)?;
            schemas.insert(ns.name.clone(), Arc::clone(&ns.schema));
        }

        if let Some(unknown) = namers.keys().find(|k| !schemas.contains_key(*k)) {
            return Err(QueryDiffError::join(format!(
                "column naming rule given for unknown schema '{}'",
                unknown
            )));
        }

        let mut columns = Vec::new();
        let mut offsets = IndexMap::new();
        let mut seen = HashSet::new();

        for (name, schema) in &schemas {
            offsets.insert(name.clone(), columns.len());
            let namer = namers.get(name);

            for col in schema.columns() {
                let joined_name = match namer {
                    Some(namer) => namer(&col.name),
                    None => col.name.clone(),
                };
                if !seen.insert(joined_name.to_lowercase()) {
                    return Err(QueryDiffError::join(format!(
                        "joined column name '{}' is ambiguous",
                        joined_name
                    )));
                }
                let tag = columns.len() as u64;
                columns.push(Column::new(joined_name, tag, col.col_type.clone()));
            }
        }

        Ok(Self {
            joined: Arc::new(Schema::new(columns)),
            schemas,
            offsets,
        })
    }

    /// The combined schema
    pub fn joined_schema(&self) -> &Arc<Schema> {
        &self.joined
    }

    /// Original schema of one side
    pub fn schema_for_name(&self, name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(name)
    }

    /// Combine the given sides into one joined row. Absent sides are null.
    pub fn join(&self, rows: &IndexMap<String, Row>) -> Result<Row> {
        if rows.is_empty() {
            return Err(QueryDiffError::join("no rows to join"));
        }

        let mut values = vec![Value::Null; self.joined.len()];
        for (name, row) in rows {
            let (Some(schema), Some(&offset)) = (self.schemas.get(name), self.offsets.get(name))
            else {
                return Err(QueryDiffError::join(format!("unknown schema name '{}'", name)));
            };
            if **row.schema() != **schema {
                return Err(QueryDiffError::join(format!(
                    "row for '{}' does not match its schema",
                    name
                )));
            }
            for (i, value) in row.values().iter().enumerate() {
                values[offset + i] = value.clone();
            }
        }

        Row::new(Arc::clone(&self.joined), values)
    }

    /// Split a joined row back into one row per side
    pub fn split(&self, joined: &Row) -> Result<IndexMap<String, Row>> {
        if **joined.schema() != *self.joined {
            return Err(QueryDiffError::join("row is not over the joined schema"));
        }

        let mut rows = IndexMap::new();
        for (name, schema) in &self.schemas {
            let offset = self.offsets[name];
            let values = joined.values()[offset..offset + schema.len()].to_vec();
            rows.insert(name.clone(), Row::new(Arc::clone(schema), values)?);
        }
        Ok(rows)
    }
}

fn check_compatible(reference: &Schema, other: &Schema, ref_name: &str, name: &str) -> Result<()> {
    if reference.len() != other.len() {
        return Err(QueryDiffError::join(format!(
            "'{}' has {} columns but '{}' has {}",
            ref_name,
            reference.len(),
            name,
            other.len()
        )));
    }
    for (a, b) in reference.columns().iter().zip(other.columns()) {
        if a.col_type != b.col_type {
            return Err(QueryDiffError::join(format!(
                "column '{}' of '{}' is {} but column '{}' of '{}' is {}",
                a.name, ref_name, a.col_type, b.name, name, b.col_type
            )));
        }
    }
    Ok(())
}

/// Joiner for the two sides of a diff with `from_`/`to_` column prefixes
pub fn diff_joiner(schema: Arc<Schema>) -> Result<Joiner> {
    let mut namers: HashMap<String, ColNamingFn> = HashMap::new();
    namers.insert(FROM.to_string(), from_namer);
    namers.insert(TO.to_string(), to_namer);

    Joiner::new(
        vec![
            NamedSchema::new(FROM, Arc::clone(&schema)),
            NamedSchema::new(TO, schema),
        ],
        namers,
    )
}
