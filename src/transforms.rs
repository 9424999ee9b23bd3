//! Transform stages used by the query diff pipeline

use crate::joiner::{Joiner, FROM, TO};
use crate::pipeline::{ImmutableProperties, PipelineRow, RowTransform};
use crate::row::{Row, Schema, Value};
use std::fmt;
use std::sync::Arc;

pub const SPLIT_DIFFS_STAGE: &str = "split_diffs";
pub const NULL_PRINTING_STAGE: &str = "null_printing";
pub const FWT_STAGE: &str = "fwt";

/// Property naming what a row represents in the diff. Rows without it are
/// headers.
pub const DIFF_TYPE_PROP: &str = "diff_type";
/// Set by the diff source: whether the joined row carries a "from" side
pub const FROM_PRESENT_PROP: &str = "from_present";
/// Set by the diff source: whether the joined row carries a "to" side
pub const TO_PRESENT_PROP: &str = "to_present";

pub const NULL_PRINT_VALUE: &str = "<NULL>";
pub const DEFAULT_FWT_SAMPLE_ROWS: usize = 1000;
pub const DEFAULT_FWT_MAX_WIDTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    Removed,
    Added,
    ModifiedOld,
    ModifiedNew,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Removed => "removed",
            DiffType::Added => "added",
            DiffType::ModifiedOld => "modified_old",
            DiffType::ModifiedNew => "modified_new",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "removed" => Some(DiffType::Removed),
            "added" => Some(DiffType::Added),
            "modified_old" => Some(DiffType::ModifiedOld),
            "modified_new" => Some(DiffType::ModifiedNew),
            _ => None,
        }
    }

    /// Diff type carried by a pipeline row, if any
    pub fn of(props: &ImmutableProperties) -> Option<Self> {
        props
            .get(DIFF_TYPE_PROP)
            .and_then(|v| v.as_str())
            .and_then(Self::parse)
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits a joined diff row back into its sides, one output row per side
/// present, each tagged with its [`DiffType`].
pub struct DiffSplitter {
    joiner: Arc<Joiner>,
    union: Arc<Schema>,
}

impl DiffSplitter {
    pub fn new(joiner: Arc<Joiner>, union: Arc<Schema>) -> Self {
        Self { joiner, union }
    }

    fn side_present(props: &ImmutableProperties, key: &str, side: &Row) -> bool {
        props
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or_else(|| side.values().iter().any(|v| !v.is_null()))
    }
}

impl RowTransform for DiffSplitter {
    fn transform(&mut self, row: &PipelineRow) -> Result<Vec<PipelineRow>, String> {
        let mut sides = self.joiner.split(&row.row).map_err(|e| e.to_string())?;
        let (Some(from), Some(to)) = (sides.shift_remove(FROM), sides.shift_remove(TO)) else {
            return Err("joined row is missing a side".to_string());
        };

        let has_from = Self::side_present(&row.props, FROM_PRESENT_PROP, &from);
        let has_to = Self::side_present(&row.props, TO_PRESENT_PROP, &to);

        let tagged = |side: &Row, diff_type: DiffType| -> Result<PipelineRow, String> {
            let converted = side.convert_to(&self.union).map_err(|e| e.to_string())?;
            Ok(PipelineRow::with_props(
                converted,
                row.props.set(DIFF_TYPE_PROP, diff_type.as_str()),
            ))
        };

        match (has_from, has_to) {
            (true, true) => Ok(vec![
                tagged(&from, DiffType::ModifiedOld)?,
                tagged(&to, DiffType::ModifiedNew)?,
            ]),
            (true, false) => Ok(vec![tagged(&from, DiffType::Removed)?]),
            (false, true) => Ok(vec![tagged(&to, DiffType::Added)?]),
            (false, false) => Err("joined row has neither side".to_string()),
        }
    }
}

/// Renders every value as text, with nulls shown as `<NULL>`
#[derive(Default)]
pub struct NullPrinter {
    cache: Option<(Arc<Schema>, Arc<Schema>)>,
}

impl NullPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    fn untyped_for(&mut self, schema: &Arc<Schema>) -> Arc<Schema> {
        match &self.cache {
            Some((typed, untyped)) if Arc::ptr_eq(typed, schema) => Arc::clone(untyped),
            _ => {
                let untyped = Arc::new(schema.to_untyped());
                self.cache = Some((Arc::clone(schema), Arc::clone(&untyped)));
                untyped
            }
        }
    }
}

impl RowTransform for NullPrinter {
    fn transform(&mut self, row: &PipelineRow) -> Result<Vec<PipelineRow>, String> {
        let untyped = self.untyped_for(row.row.schema());
        let values = row
            .row
            .values()
            .iter()
            .map(|v| match v {
                Value::Null => Value::Text(NULL_PRINT_VALUE.to_string()),
                Value::Text(s) => Value::Text(s.clone()),
                other => Value::Text(other.to_string()),
            })
            .collect();

        let printed = Row::new(untyped, values).map_err(|e| e.to_string())?;
        Ok(vec![PipelineRow::with_props(printed, row.props.clone())])
    }
}

/// Pads text values to per-column widths learned from the first rows seen.
///
/// The first `sample_rows` rows are held back and measured; every later row
/// is formatted with the widths learned from them. Values wider than their
/// column are replaced by `#` repeated to the column width.
pub struct FixedWidthTransformer {
    sample_rows: usize,
    max_width: usize,
    held: Vec<PipelineRow>,
    widths: Option<Vec<usize>>,
}

impl FixedWidthTransformer {
    pub fn new(sample_rows: usize, max_width: usize) -> Self {
        Self {
            sample_rows: sample_rows.max(1),
            max_width: max_width.max(1),
            held: Vec::new(),
            widths: None,
        }
    }

    pub fn widths(&self) -> Option<&[usize]> {
        self.widths.as_deref()
    }

    fn measure(&self) -> Result<Vec<usize>, String> {
        let columns = self.held.first().map_or(0, |r| r.row.len());
        let mut widths = vec![0usize; columns];

        for held in &self.held {
            if held.row.len() != columns {
                return Err(format!(
                    "row has {} columns, expected {}",
                    held.row.len(),
                    columns
                ));
            }
            for (width, value) in widths.iter_mut().zip(held.row.values()) {
                *width = (*width).max(text_of(value)?.chars().count());
            }
        }

        Ok(widths.into_iter().map(|w| w.min(self.max_width)).collect())
    }

    fn format(widths: &[usize], row: &PipelineRow) -> Result<PipelineRow, String> {
        if row.row.len() != widths.len() {
            return Err(format!(
                "row has {} columns, expected {}",
                row.row.len(),
                widths.len()
            ));
        }

        let values = row
            .row
            .values()
            .iter()
            .zip(widths)
            .map(|(value, &width)| text_of(value).map(|text| Value::Text(fit(text, width))))
            .collect::<Result<Vec<_>, String>>()?;

        let formatted = Row::new(Arc::clone(row.row.schema()), values).map_err(|e| e.to_string())?;
        Ok(PipelineRow::with_props(formatted, row.props.clone()))
    }

    fn release(&mut self) -> Result<Vec<PipelineRow>, String> {
        let widths = self.measure()?;
        let out = self
            .held
            .iter()
            .map(|r| Self::format(&widths, r))
            .collect::<Result<Vec<_>, String>>()?;
        self.held.clear();
        self.widths = Some(widths);
        Ok(out)
    }
}

fn text_of(value: &Value) -> Result<&str, String> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(format!(
            "fixed width formatting expects text values, got '{}'",
            other
        )),
    }
}

fn fit(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        return "#".repeat(width);
    }
    let mut padded = String::with_capacity(width);
    padded.push_str(text);
    padded.extend(std::iter::repeat(' ').take(width - len));
    padded
}

impl RowTransform for FixedWidthTransformer {
    fn transform(&mut self, row: &PipelineRow) -> Result<Vec<PipelineRow>, String> {
        if let Some(widths) = &self.widths {
            return Self::format(widths, row).map(|r| vec![r]);
        }

        self.held.push(row.clone());
        if self.held.len() >= self.sample_rows {
            self.release()
        } else {
            Ok(Vec::new())
        }
    }

    fn finish(&mut self) -> Result<Vec<PipelineRow>, String> {
        if self.widths.is_some() || self.held.is_empty() {
            return Ok(Vec::new());
        }
        self.release()
    }
}
