//! Merge-based diff of two ordered row streams

use crate::error::Result;
use crate::row::Row;
use crate::source::{RowComparator, RowSource};
use std::cmp::Ordering;

/// One diff output. Never empty on both sides; the merger only produces
/// one-sided units.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffUnit {
    pub from: Option<Row>,
    pub to: Option<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Removed,
    Added,
    /// Both sides set. Reserved for units built outside the merger, which
    /// reports an update as a removal plus a later addition.
    Replaced,
}

impl DiffUnit {
    pub fn removed(row: Row) -> Self {
        Self {
            from: Some(row),
            to: None,
        }
    }

    pub fn added(row: Row) -> Self {
        Self {
            from: None,
            to: Some(row),
        }
    }

    pub fn kind(&self) -> DiffKind {
        match (&self.from, &self.to) {
            (Some(_), Some(_)) => DiffKind::Replaced,
            (Some(_), None) => DiffKind::Removed,
            _ => DiffKind::Added,
        }
    }
}

/// Counters kept while merging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub removed: u64,
    pub added: u64,
    pub unchanged: u64,
}

/// Single-pass merge of a "from" and a "to" source sorted by the same order.
///
/// Holds one lookahead row per side. Rows at the same sort position cancel
/// when equal; when they differ only the "from" row is emitted as a
/// removal and the "to" row stays pending for the next comparison, so
/// updates always surface as removal followed by a later addition.
pub struct DiffMerger<F, T> {
    from: F,
    to: T,
    cmp: RowComparator,
    from_row: Option<Row>,
    to_row: Option<Row>,
    from_done: bool,
    to_done: bool,
    failed: bool,
    stats: MergeStats,
}

impl<F: RowSource, T: RowSource> DiffMerger<F, T> {
    pub fn new(from: F, to: T, cmp: RowComparator) -> Self {
        Self {
            from,
            to,
            cmp,
            from_row: None,
            to_row: None,
            from_done: false,
            to_done: false,
            failed: false,
            stats: MergeStats::default(),
        }
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Next diff unit, `None` when both sides are exhausted
    pub fn next_diff(&mut self) -> Result<Option<DiffUnit>> {
        let result = self.advance();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn advance(&mut self) -> Result<Option<DiffUnit>> {
        loop {
            if self.from_row.is_none() && !self.from_done {
                self.from_row = self.from.next_row().map_err(|e| e.at_side("from"))?;
                self.from_done = self.from_row.is_none();
            }
            if self.to_row.is_none() && !self.to_done {
                self.to_row = self.to.next_row().map_err(|e| e.at_side("to"))?;
                self.to_done = self.to_row.is_none();
            }

            let (from_row, to_row) = match (self.from_row.take(), self.to_row.take()) {
                (None, None) => {
                    log::debug!(
                        "diff merge finished: {} removed, {} added, {} unchanged",
                        self.stats.removed,
                        self.stats.added,
                        self.stats.unchanged
                    );
                    return Ok(None);
                }
                (Some(row), None) => {
                    self.stats.removed += 1;
                    return Ok(Some(DiffUnit::removed(row)));
                }
                (None, Some(row)) => {
                    self.stats.added += 1;
                    return Ok(Some(DiffUnit::added(row)));
                }
                (Some(from_row), Some(to_row)) => (from_row, to_row),
            };

            let ord = match (self.cmp)(&from_row, &to_row) {
                Ok(ord) => ord,
                Err(e) => {
                    self.from_row = Some(from_row);
                    self.to_row = Some(to_row);
                    return Err(e);
                }
            };

            match ord {
                Ordering::Less => {
                    self.to_row = Some(to_row);
                    self.stats.removed += 1;
                    return Ok(Some(DiffUnit::removed(from_row)));
                }
                Ordering::Greater => {
                    self.from_row = Some(from_row);
                    self.stats.added += 1;
                    return Ok(Some(DiffUnit::added(to_row)));
                }
                Ordering::Equal if from_row.values_equal(&to_row) => {
                    self.stats.unchanged += 1;
                }
                Ordering::Equal => {
                    // same position, different values: no update detection
                    self.to_row = Some(to_row);
                    self.stats.removed += 1;
                    return Ok(Some(DiffUnit::removed(from_row)));
                }
            }
        }
    }
}

impl<F: RowSource, T: RowSource> Iterator for DiffMerger<F, T> {
    type Item = Result<DiffUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_diff().transpose()
    }
}
