use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::decode::Value;
use crate::error::ExportError;

/// One output CSV file, owned for the duration of a single topic export.
/// Dropping the sink closes the file; [`CsvSink::finish`] also surfaces
/// flush errors.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
    rows: u64,
}

impl CsvSink {
    /// Create or truncate `path`
    pub fn create(path: &Path) -> Result<Self, ExportError> {
        let file = File::create(path).map_err(|source| ExportError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: csv::Writer::from_writer(BufWriter::new(file)),
            rows: 0,
        })
    }

    pub fn write_header(&mut self, columns: &[String]) -> Result<(), ExportError> {
        self.writer
            .write_record(columns)
            .map_err(|e| self.write_err(e))
    }

    pub fn write_row(&mut self, values: &[&Value]) -> Result<(), ExportError> {
        self.writer
            .write_record(values.iter().map(|v| v.to_string()))
            .map_err(|e| self.write_err(e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn finish(mut self) -> Result<PathBuf, ExportError> {
        self.writer.flush().map_err(|source| ExportError::FileWrite {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.path)
    }

    fn write_err(&self, e: csv::Error) -> ExportError {
        ExportError::FileWrite {
            path: self.path.clone(),
            source: e.into(),
        }
    }
}
