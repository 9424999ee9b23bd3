//! Concurrent staged row pipeline
//!
//! A pipeline runs one source, an ordered chain of named transform stages and
//! one sink, each on its own thread. Adjacent workers hand rows over through
//! bounded FIFO queues, so row order is preserved end to end and a slow
//! consumer applies backpressure to everything upstream.
//!
//! The first error raised anywhere stops the pipeline: every worker checks a
//! shared stop flag between rows, queued rows are discarded, and [`Pipeline::wait`]
//! returns that error after running the registered cleanup hooks.

use crate::error::{QueryDiffError, Result};
use crate::row::Row;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Queue capacity between adjacent workers
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// Metadata travelling with a row. Never interpreted by the pipeline itself.
#[derive(Debug, Clone, Default)]
pub struct ImmutableProperties {
    props: Option<Arc<HashMap<String, Value>>>,
}

impl ImmutableProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.as_ref().and_then(|p| p.get(key))
    }

    /// Copy of these properties with one key set
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut props = self
            .props
            .as_ref()
            .map(|p| HashMap::clone(p))
            .unwrap_or_default();
        props.insert(key.into(), value.into());
        Self {
            props: Some(Arc::new(props)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.props.as_ref().map_or(true, |p| p.is_empty())
    }
}

/// A row plus its properties
#[derive(Debug, Clone)]
pub struct PipelineRow {
    pub row: Row,
    pub props: ImmutableProperties,
}

impl PipelineRow {
    pub fn new(row: Row) -> Self {
        Self {
            row,
            props: ImmutableProperties::new(),
        }
    }

    pub fn with_props(row: Row, props: ImmutableProperties) -> Self {
        Self { row, props }
    }
}

/// A row a stage could not process
#[derive(Debug, Clone)]
pub struct TransformRowFailure {
    pub transform_name: String,
    /// `None` when the stage failed while flushing buffered rows
    pub row: Option<Row>,
    pub details: String,
}

/// One pipeline stage: turns each input row into zero or more output rows
pub trait RowTransform: Send {
    fn transform(&mut self, row: &PipelineRow) -> std::result::Result<Vec<PipelineRow>, String>;

    /// Called once after the upstream finished cleanly, for stages that
    /// hold rows back
    fn finish(&mut self) -> std::result::Result<Vec<PipelineRow>, String> {
        Ok(Vec::new())
    }
}

/// Stage with the name used for injection and failure reports
pub struct NamedTransform {
    pub name: String,
    pub transform: Box<dyn RowTransform>,
}

impl NamedTransform {
    pub fn new(name: impl Into<String>, transform: impl RowTransform + 'static) -> Self {
        Self {
            name: name.into(),
            transform: Box::new(transform),
        }
    }
}

impl fmt::Debug for NamedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedTransform")
            .field("name", &self.name)
            .finish()
    }
}

/// Destination of fully transformed rows
pub trait RowSink: Send {
    fn write_row(&mut self, row: &PipelineRow) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

pub type SourceFn = Box<dyn FnMut() -> Result<Option<PipelineRow>> + Send>;
pub type SinkFn = Box<dyn FnMut(&PipelineRow) -> Result<()> + Send>;
/// Decides whether a failed row aborts the pipeline (`true`) or is dropped
pub type BadRowCallback = Arc<dyn Fn(&TransformRowFailure) -> bool + Send + Sync>;

type Hook = Box<dyn FnOnce() + Send>;

/// Adapt a fallible row-producing function into a source
pub fn source_fn<F>(f: F) -> SourceFn
where
    F: FnMut() -> Result<Option<PipelineRow>> + Send + 'static,
{
    Box::new(f)
}

/// Sink function writing into a shared sink, so a cleanup hook can close it
pub fn sink_fn<S: RowSink + 'static>(sink: Arc<Mutex<S>>) -> SinkFn {
    Box::new(move |row: &PipelineRow| {
        let mut sink = sink
            .lock()
            .map_err(|_| QueryDiffError::pipeline("sink lock poisoned"))?;
        sink.write_row(row)
    })
}

/// Log the failure and abort
pub fn default_bad_row_callback() -> BadRowCallback {
    Arc::new(|failure: &TransformRowFailure| {
        log::error!(
            "Failed transforming row\n{}\n{}",
            failure.transform_name,
            failure.details
        );
        true
    })
}

struct Shared {
    stop: AtomicBool,
    first_error: Mutex<Option<QueryDiffError>>,
}

impl Shared {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn fail(&self, err: QueryDiffError) {
        if let Ok(mut slot) = self.first_error.lock() {
            if slot.is_none() {
                log::debug!("pipeline stopping: {}", err);
                *slot = Some(err);
            }
        }
        self.stop.store(true, Ordering::SeqCst);
    }

    fn take_error(&self) -> Option<QueryDiffError> {
        self.first_error.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Marks the pipeline failed when its worker unwinds. Declared inside a
/// worker body so it drops before the worker's channel ends close.
struct PanicGuard {
    name: String,
    shared: Arc<Shared>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared
                .fail(QueryDiffError::pipeline(format!("stage '{}' panicked", self.name)));
        }
    }
}

struct Parts {
    source: SourceFn,
    transforms: Vec<NamedTransform>,
    sink: SinkFn,
    bad_row_cb: BadRowCallback,
}

/// Staged executor: source -> transforms -> sink
pub struct Pipeline {
    parts: Option<Parts>,
    injected: HashMap<String, Vec<PipelineRow>>,
    hooks: Vec<Hook>,
    handles: Vec<(String, JoinHandle<()>)>,
    shared: Arc<Shared>,
    buffer_size: usize,
}

impl Pipeline {
    pub fn new(
        source: SourceFn,
        transforms: Vec<NamedTransform>,
        sink: SinkFn,
        bad_row_cb: BadRowCallback,
    ) -> Self {
        Self {
            parts: Some(Parts {
                source,
                transforms,
                sink,
                bad_row_cb,
            }),
            injected: HashMap::new(),
            hooks: Vec::new(),
            handles: Vec::new(),
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                first_error: Mutex::new(None),
            }),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Queue capacity between workers; at least 2
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(2);
        self
    }

    /// Deliver `row` to the named stage ahead of anything from upstream
    pub fn inject_row(&mut self, stage_name: &str, row: PipelineRow) -> Result<()> {
        let Some(parts) = &self.parts else {
            return Err(QueryDiffError::pipeline("cannot inject rows into a started pipeline"));
        };
        if !parts.transforms.iter().any(|t| t.name == stage_name) {
            return Err(QueryDiffError::pipeline(format!(
                "no stage named '{}'",
                stage_name
            )));
        }
        self.injected
            .entry(stage_name.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    /// Register an action run exactly once when the pipeline is done
    pub fn run_after(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Spawn the workers. Calling it again is a no-op.
    pub fn start(&mut self) -> Result<()> {
        let Some(parts) = self.parts.take() else {
            return Ok(());
        };
        let Parts {
            source,
            transforms,
            sink,
            bad_row_cb,
        } = parts;

        log::debug!(
            "starting pipeline with {} stages, buffer size {}",
            transforms.len(),
            self.buffer_size
        );

        let (source_tx, mut upstream) = bounded::<PipelineRow>(self.buffer_size);
        let shared = Arc::clone(&self.shared);
        self.spawn("source", move || run_source(source, source_tx, shared))?;

        for stage in transforms {
            let (tx, rx) = bounded::<PipelineRow>(self.buffer_size);
            let injected = self.injected.remove(&stage.name).unwrap_or_default();
            let shared = Arc::clone(&self.shared);
            let cb = Arc::clone(&bad_row_cb);
            let input = std::mem::replace(&mut upstream, rx);
            let name = stage.name.clone();
            self.spawn(&name, move || {
                run_stage(stage, injected, input, tx, shared, cb)
            })?;
        }

        let shared = Arc::clone(&self.shared);
        self.spawn("sink", move || run_sink(sink, upstream, shared))?;
        Ok(())
    }

    fn spawn(&mut self, name: &str, work: impl FnOnce() + Send + 'static) -> Result<()> {
        match std::thread::Builder::new()
            .name(format!("pipeline-{}", name))
            .spawn(work)
        {
            Ok(handle) => {
                self.handles.push((name.to_string(), handle));
                Ok(())
            }
            Err(e) => {
                let err = QueryDiffError::pipeline(format!(
                    "failed to start stage '{}': {}",
                    name, e
                ));
                self.shared.fail(QueryDiffError::pipeline(err.to_string()));
                Err(err)
            }
        }
    }

    /// Block until every worker is done, run the cleanup hooks and return
    /// the first error seen. Starts the pipeline if needed; only the first
    /// call reports the outcome.
    pub fn wait(&mut self) -> Result<()> {
        let started = self.start();
        self.join_all();
        self.run_hooks();

        match self.shared.take_error() {
            Some(err) => Err(err),
            None => started,
        }
    }

    fn join_all(&mut self) {
        for (name, handle) in self.handles.drain(..) {
            if handle.join().is_err() {
                self.shared
                    .fail(QueryDiffError::pipeline(format!("stage '{}' panicked", name)));
            }
        }
    }

    fn run_hooks(&mut self) {
        for hook in self.hooks.drain(..) {
            hook();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shared.stop.store(true, Ordering::SeqCst);
            self.join_all();
        }
        self.run_hooks();
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("started", &self.parts.is_none())
            .field("workers", &self.handles.len())
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

fn run_source(mut source: SourceFn, tx: Sender<PipelineRow>, shared: Arc<Shared>) {
    let _guard = PanicGuard {
        name: "source".to_string(),
        shared: Arc::clone(&shared),
    };
    let mut produced = 0u64;
    while !shared.stopped() {
        match source() {
            Ok(Some(row)) => {
                if tx.send(row).is_err() {
                    break;
                }
                produced += 1;
            }
            Ok(None) => break,
            Err(e) => {
                shared.fail(e);
                break;
            }
        }
    }
    log::debug!("pipeline source done after {} rows", produced);
}

enum Flow {
    Continue,
    Stop,
}

fn run_stage(
    mut stage: NamedTransform,
    injected: Vec<PipelineRow>,
    input: Receiver<PipelineRow>,
    output: Sender<PipelineRow>,
    shared: Arc<Shared>,
    bad_row_cb: BadRowCallback,
) {
    let _guard = PanicGuard {
        name: stage.name.clone(),
        shared: Arc::clone(&shared),
    };
    let mut processed = 0u64;

    let handle = |row: &PipelineRow, stage: &mut NamedTransform| -> Flow {
        match stage.transform.transform(row) {
            Ok(rows) => send_all(rows, &output),
            Err(details) => report_failure(&stage.name, Some(row), details, &shared, &bad_row_cb),
        }
    };

    for row in &injected {
        if let Flow::Stop = handle(row, &mut stage) {
            return;
        }
    }

    for row in input.iter() {
        if shared.stopped() {
            return;
        }
        processed += 1;
        if let Flow::Stop = handle(&row, &mut stage) {
            return;
        }
    }

    // upstream closed; only flush if it closed because it was done
    if shared.stopped() {
        return;
    }
    match stage.transform.finish() {
        Ok(rows) => {
            send_all(rows, &output);
        }
        Err(details) => {
            report_failure(&stage.name, None, details, &shared, &bad_row_cb);
        }
    }
    log::debug!("pipeline stage '{}' done after {} rows", stage.name, processed);
}

fn send_all(rows: Vec<PipelineRow>, output: &Sender<PipelineRow>) -> Flow {
    for row in rows {
        if output.send(row).is_err() {
            return Flow::Stop;
        }
    }
    Flow::Continue
}

fn report_failure(
    stage_name: &str,
    row: Option<&PipelineRow>,
    details: String,
    shared: &Shared,
    bad_row_cb: &BadRowCallback,
) -> Flow {
    let failure = TransformRowFailure {
        transform_name: stage_name.to_string(),
        row: row.map(|r| r.row.clone()),
        details,
    };
    if bad_row_cb(&failure) {
        shared.fail(QueryDiffError::TransformFailed {
            stage: failure.transform_name,
            details: failure.details,
        });
        Flow::Stop
    } else {
        log::warn!("skipping row rejected by stage '{}'", stage_name);
        Flow::Continue
    }
}

fn run_sink(mut sink: SinkFn, input: Receiver<PipelineRow>, shared: Arc<Shared>) {
    let _guard = PanicGuard {
        name: "sink".to_string(),
        shared: Arc::clone(&shared),
    };
    let mut written = 0u64;
    for row in input.iter() {
        if shared.stopped() {
            return;
        }
        if let Err(e) = sink(&row) {
            shared.fail(e);
            return;
        }
        written += 1;
    }
    log::debug!("pipeline sink done after {} rows", written);
}
