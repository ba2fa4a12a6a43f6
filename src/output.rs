//! Tab-separated solution output for the CLI frontend.

use std::io::{BufWriter, Write};

use crate::error::Result;

/// Writes `time` followed by one column per unknown.
pub struct TsvOutput<W: Write> {
    writer: BufWriter<W>,
    columns: usize,
}

impl<W: Write> TsvOutput<W> {
    /// Create a writer for rows of `columns` values.
    pub fn new(writer: W, columns: usize) -> Self {
        Self {
            writer: BufWriter::new(writer),
            columns,
        }
    }

    /// Write the header line.
    pub fn write_header<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        crate::error::TiaError::check_len("output header", self.columns, names.len())?;
        write!(self.writer, "time")?;
        for name in names {
            write!(self.writer, "\t{}", name.as_ref())?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    /// Write one solution row.
    pub fn write_row(&mut self, time: f64, values: &[f64]) -> Result<()> {
        crate::error::TiaError::check_len("output row", self.columns, values.len())?;
        write!(self.writer, "{:.9e}", time)?;
        for v in values {
            write!(self.writer, "\t{:.9e}", v)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    /// Flush the output stream.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
