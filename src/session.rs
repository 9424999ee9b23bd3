//! Diff of one query's results between two revisions

use crate::engine::{QueryEngine, QueryResult};
use crate::error::{QueryDiffError, Result};
use crate::joiner::{diff_joiner, Joiner, FROM, TO};
use crate::merger::{DiffKind, DiffMerger};
use crate::pipeline::{
    default_bad_row_callback, sink_fn, source_fn, BadRowCallback, ImmutableProperties,
    NamedTransform, Pipeline, PipelineRow, RowSink, DEFAULT_BUFFER_SIZE,
};
use crate::row::{Row, Schema, Value};
use crate::source::RowComparator;
use crate::transforms::{
    DiffSplitter, FixedWidthTransformer, NullPrinter, DEFAULT_FWT_MAX_WIDTH,
    DEFAULT_FWT_SAMPLE_ROWS, FROM_PRESENT_PROP, FWT_STAGE, NULL_PRINTING_STAGE,
    SPLIT_DIFFS_STAGE, TO_PRESENT_PROP,
};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Knobs for one diff run
#[derive(Clone)]
pub struct DiffOptions {
    pub buffer_size: usize,
    pub fwt_sample_rows: usize,
    pub fwt_max_width: usize,
    pub bad_row_callback: BadRowCallback,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            fwt_sample_rows: DEFAULT_FWT_SAMPLE_ROWS,
            fwt_max_width: DEFAULT_FWT_MAX_WIDTH,
            bad_row_callback: default_bad_row_callback(),
        }
    }
}

impl std::fmt::Debug for DiffOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffOptions")
            .field("buffer_size", &self.buffer_size)
            .field("fwt_sample_rows", &self.fwt_sample_rows)
            .field("fwt_max_width", &self.fwt_max_width)
            .finish()
    }
}

/// Rows reported on each side of a finished diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub removed: u64,
    pub added: u64,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.added == 0
    }
}

/// Run `query` on both revisions and stream the difference into `sink`.
///
/// Both results must have equal schemas and a usable ordering. The sink is
/// closed once the pipeline is done, whatever the outcome.
pub fn diff_query<S>(
    from: &dyn QueryEngine,
    to: &dyn QueryEngine,
    query: &str,
    sink: S,
    options: DiffOptions,
) -> Result<DiffSummary>
where
    S: RowSink + 'static,
{
    let from_result = run_side(from, FROM, query)?;
    let to_result = run_side(to, TO, query)?;

    if *from_result.schema != *to_result.schema {
        return Err(QueryDiffError::schema_mismatch(format!(
            "from ({}) vs to ({})",
            from_result.schema.describe(),
            to_result.schema.describe()
        )));
    }

    let cmp = comparator_for(from, &from_result, query)?;
    comparator_for(to, &to_result, query)?;

    let schema = Arc::clone(&from_result.schema);
    let joiner = Arc::new(diff_joiner(Arc::clone(&schema))?);
    let summary = Arc::new(DiffCounters::default());

    let source = diff_source(from_result, to_result, cmp, Arc::clone(&joiner), Arc::clone(&summary))?;

    let transforms = vec![
        NamedTransform::new(SPLIT_DIFFS_STAGE, DiffSplitter::new(joiner, Arc::clone(&schema))),
        NamedTransform::new(NULL_PRINTING_STAGE, NullPrinter::new()),
        NamedTransform::new(
            FWT_STAGE,
            FixedWidthTransformer::new(options.fwt_sample_rows, options.fwt_max_width),
        ),
    ];

    let sink = Arc::new(Mutex::new(sink));
    let mut pipeline = Pipeline::new(
        source,
        transforms,
        sink_fn(Arc::clone(&sink)),
        options.bad_row_callback,
    )
    .with_buffer_size(options.buffer_size);

    pipeline.inject_row(FWT_STAGE, header_row(&schema)?)?;
    pipeline.run_after(move || match sink.lock() {
        Ok(mut sink) => {
            if let Err(e) = sink.close() {
                log::error!("failed to close diff output: {}", e);
            }
        }
        Err(_) => log::error!("failed to close diff output: sink lock poisoned"),
    });

    pipeline.start()?;
    pipeline.wait()?;

    let summary = summary.snapshot();
    log::debug!(
        "query diff finished: {} removed, {} added",
        summary.removed,
        summary.added
    );
    Ok(summary)
}

fn run_side(engine: &dyn QueryEngine, side: &str, query: &str) -> Result<QueryResult> {
    engine.execute_query(query).map_err(|e| match e {
        e @ QueryDiffError::RowConversion { .. } => e,
        e => QueryDiffError::query(format!(
            "cannot execute query at {} revision: {}",
            side, e
        )),
    })
}

/// The comparator a side's rows are ordered by, or the unordered-result
/// diagnostic with the query plan
fn comparator_for(engine: &dyn QueryEngine, result: &QueryResult, query: &str) -> Result<RowComparator> {
    let cause = match result.rows.row_comparator(&result.schema) {
        Ok(Some(cmp)) => return Ok(cmp),
        Ok(None) => None,
        Err(e) => Some(e),
    };
    if let Some(cause) = &cause {
        log::debug!("comparator unavailable: {}", cause);
    }

    Err(match engine.describe_plan(query) {
        Ok(plan) => QueryDiffError::UnorderedResult { plan },
        Err(e) => QueryDiffError::UnorderedResultNoPlan {
            cause: e.to_string(),
        },
    })
}

#[derive(Debug, Default)]
struct DiffCounters {
    removed: AtomicU64,
    added: AtomicU64,
}

impl DiffCounters {
    fn snapshot(&self) -> DiffSummary {
        DiffSummary {
            removed: self.removed.load(Ordering::SeqCst),
            added: self.added.load(Ordering::SeqCst),
        }
    }
}

/// Pipeline source producing one joined row per diff unit
fn diff_source(
    from: QueryResult,
    to: QueryResult,
    cmp: RowComparator,
    joiner: Arc<Joiner>,
    counters: Arc<DiffCounters>,
) -> Result<crate::pipeline::SourceFn> {
    let from_schema = side_schema(&joiner, FROM)?;
    let to_schema = side_schema(&joiner, TO)?;
    let mut merger = DiffMerger::new(from.rows, to.rows, cmp);

    Ok(source_fn(move || {
        let Some(unit) = merger.next_diff()? else {
            return Ok(None);
        };

        let mut sides = IndexMap::new();
        let props = ImmutableProperties::new()
            .set(FROM_PRESENT_PROP, unit.from.is_some())
            .set(TO_PRESENT_PROP, unit.to.is_some());

        if let Some(row) = &unit.from {
            sides.insert(FROM.to_string(), row.convert_to(&from_schema)?);
        }
        if let Some(row) = &unit.to {
            sides.insert(TO.to_string(), row.convert_to(&to_schema)?);
        }
        match unit.kind() {
            DiffKind::Removed => counters.removed.fetch_add(1, Ordering::SeqCst),
            DiffKind::Added => counters.added.fetch_add(1, Ordering::SeqCst),
            DiffKind::Replaced => {
                counters.removed.fetch_add(1, Ordering::SeqCst);
                counters.added.fetch_add(1, Ordering::SeqCst)
            }
        };

        Ok(Some(PipelineRow::with_props(joiner.join(&sides)?, props)))
    }))
}

fn side_schema(joiner: &Joiner, side: &str) -> Result<Arc<Schema>> {
    joiner
        .schema_for_name(side)
        .cloned()
        .ok_or_else(|| QueryDiffError::join(format!("no schema for side '{}'", side)))
}

/// Column names as a text row, shaped like the rows leaving null printing
fn header_row(schema: &Schema) -> Result<PipelineRow> {
    let untyped = Arc::new(schema.to_untyped());
    let names = schema
        .columns()
        .iter()
        .map(|c| Value::Text(c.name.clone()))
        .collect();
    Ok(PipelineRow::new(Row::new(untyped, names)?))
}
