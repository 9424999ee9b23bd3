//! Ordered row sources and the comparator capability they may expose

use crate::error::{QueryDiffError, Result};
use crate::row::{Row, Schema};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Three-way comparison of two rows of the same schema, in the total order
/// a source produced its rows in.
pub type RowComparator = Arc<dyn Fn(&Row, &Row) -> Result<Ordering> + Send + Sync>;

/// Sequential provider of rows, optionally able to compare them
pub trait RowSource: Send {
    /// Next row, or `None` once the source is exhausted
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Comparator matching the order rows are produced in.
    ///
    /// `Ok(None)` means the source is not ordered; callers must treat that
    /// as a normal outcome.
    fn row_comparator(&self, schema: &Schema) -> Result<Option<RowComparator>>;
}

impl<S> RowSource for Box<S>
where
    S: RowSource + ?Sized,
{
    fn next_row(&mut self) -> Result<Option<Row>> {
        self.as_mut().next_row()
    }

    fn row_comparator(&self, schema: &Schema) -> Result<Option<RowComparator>> {
        self.as_ref().row_comparator(schema)
    }
}

/// One term of a sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub descending: bool,
    pub nulls_first: bool,
}

impl SortKey {
    /// Ascending with nulls last, DuckDB's default
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            descending: false,
            nulls_first: false,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            column,
            descending: true,
            nulls_first: false,
        }
    }
}

/// Build a comparator that orders rows by the given keys
pub fn comparator_for_keys(schema: &Schema, keys: Vec<SortKey>) -> Result<RowComparator> {
    if keys.is_empty() {
        return Err(QueryDiffError::invalid_input("sort order has no keys"));
    }
    if let Some(key) = keys.iter().find(|k| k.column >= schema.len()) {
        return Err(QueryDiffError::invalid_input(format!(
            "sort column {} out of range for {} columns",
            key.column + 1,
            schema.len()
        )));
    }

    Ok(Arc::new(move |a: &Row, b: &Row| compare_by_keys(&keys, a, b)))
}

fn compare_by_keys(keys: &[SortKey], a: &Row, b: &Row) -> Result<Ordering> {
    for key in keys {
        let (Some(left), Some(right)) = (a.get(key.column), b.get(key.column)) else {
            return Err(QueryDiffError::invalid_input(format!(
                "rows are missing sort column {}",
                key.column + 1
            )));
        };

        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if key.nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if key.nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = left.sort_cmp(right)?;
                if key.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        };

        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

/// Row source over rows that are already in memory and sorted
pub struct VecRowSource {
    rows: std::vec::IntoIter<Row>,
    sort_keys: Option<Vec<SortKey>>,
}

impl VecRowSource {
    /// Ordered source; `rows` must already be sorted by `sort_keys`
    pub fn ordered(rows: Vec<Row>, sort_keys: Vec<SortKey>) -> Self {
        Self {
            rows: rows.into_iter(),
            sort_keys: Some(sort_keys),
        }
    }

    /// Source that cannot supply a comparator
    pub fn unordered(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
            sort_keys: None,
        }
    }
}

impl fmt::Debug for VecRowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecRowSource")
            .field("remaining", &self.rows.len())
            .field("sort_keys", &self.sort_keys)
            .finish()
    }
}

impl RowSource for VecRowSource {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }

    fn row_comparator(&self, schema: &Schema) -> Result<Option<RowComparator>> {
        match &self.sort_keys {
            Some(keys) => comparator_for_keys(schema, keys.clone()).map(Some),
            None => Ok(None),
        }
    }
}
