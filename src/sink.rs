//! Rendering sink for diff rows

use crate::error::Result;
use crate::pipeline::{PipelineRow, RowSink};
use crate::transforms::DiffType;
use colored::Colorize;
use std::io::{BufWriter, Stdout, Write};

const HEADER_GUTTER: &str = "   ";

/// Writes fixed-width diff rows as `| a | b |` lines, prefixed by a gutter
/// showing the row's diff type.
pub struct ColorDiffSink<W: Write + Send> {
    writer: W,
    use_color: bool,
    rows_written: u64,
}

impl ColorDiffSink<BufWriter<Stdout>> {
    pub fn stdout(use_color: bool) -> Self {
        Self::new(BufWriter::new(std::io::stdout()), use_color)
    }
}

impl<W: Write + Send> ColorDiffSink<W> {
    pub fn new(writer: W, use_color: bool) -> Self {
        Self {
            writer,
            use_color,
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn paint(&self, text: String, diff_type: DiffType) -> String {
        if !self.use_color {
            return text;
        }
        match diff_type {
            DiffType::Removed => text.red().to_string(),
            DiffType::Added => text.green().to_string(),
            DiffType::ModifiedOld | DiffType::ModifiedNew => text.yellow().to_string(),
        }
    }
}

fn gutter(diff_type: DiffType) -> &'static str {
    match diff_type {
        DiffType::Removed => " - ",
        DiffType::Added => " + ",
        DiffType::ModifiedOld => " < ",
        DiffType::ModifiedNew => " > ",
    }
}

impl<W: Write + Send> RowSink for ColorDiffSink<W> {
    fn write_row(&mut self, row: &PipelineRow) -> Result<()> {
        let cells: Vec<String> = row.row.values().iter().map(|v| v.to_string()).collect();
        let line = format!("| {} |", cells.join(" | "));

        match DiffType::of(&row.props) {
            Some(diff_type) => {
                let painted = self.paint(format!("{}{}", gutter(diff_type), line), diff_type);
                writeln!(self.writer, "{}", painted)?;
            }
            None => {
                let separator = cells
                    .iter()
                    .map(|c| "-".repeat(c.chars().count() + 2))
                    .collect::<Vec<_>>()
                    .join("+");
                writeln!(self.writer, "{}{}", HEADER_GUTTER, line)?;
                writeln!(self.writer, "{}|{}|", HEADER_GUTTER, separator)?;
            }
        }

        self.rows_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        log::debug!("diff sink closed after {} rows", self.rows_written);
        Ok(())
    }
}
