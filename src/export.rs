//! Per-topic export: one CSV file per topic
//!
//! The header comes from the first message of the topic. Every message,
//! the first included, then becomes one row under that header.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::csv_writer::CsvSink;
use crate::error::ExportError;
use crate::flatten::{extract_values, flatten_schema};
use crate::log_reader::LogReader;

/// What to do with a message that cannot be turned into a row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    /// Log, drop the row and keep going; the topic is reported as partial
    #[default]
    Skip,
    /// Stop the topic at the first bad row, keeping the rows written so far
    Abort,
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub row_error_policy: RowErrorPolicy,
    /// Emit a debug line every N rows
    pub log_every: Option<u64>,
}

impl ExportSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            row_error_policy: RowErrorPolicy::default(),
            log_every: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicReport {
    pub topic: String,
    pub path: PathBuf,
    pub columns: usize,
    pub rows_written: u64,
    pub rows_skipped: u64,
}

impl TopicReport {
    pub fn is_partial(&self) -> bool {
        self.rows_skipped > 0
    }
}

/// Output file for a topic: last path segment + `_generated.csv`.
///
/// A topic ending in `/` has an empty last segment and maps to
/// `_generated.csv`.
pub fn filename_for(topic: &str, output_dir: &Path) -> PathBuf {
    let segment = topic.rsplit('/').next().unwrap_or(topic);
    output_dir.join(format!("{segment}_generated.csv"))
}

/// Export every message of `topic` into its CSV file
pub fn export_topic<R: LogReader + ?Sized>(
    reader: &R,
    topic: &str,
    settings: &ExportSettings,
) -> Result<TopicReport, ExportError> {
    let mut messages = reader.messages(topic)?;

    let first = match messages.next() {
        None => return Err(ExportError::EmptyTopic(topic.to_string())),
        Some(Err(e)) => {
            return Err(ExportError::Structural {
                topic: topic.to_string(),
                reason: format!("first message unreadable: {e}"),
            });
        }
        Some(Ok(msg)) => msg,
    };
    let columns = flatten_schema(&first);
    // a CSV record cannot hold zero fields; it would read back as one empty column
    if columns.is_empty() {
        return Err(ExportError::Structural {
            topic: topic.to_string(),
            reason: format!("{} has no fields to tabulate", first.type_name),
        });
    }

    let path = filename_for(topic, &settings.output_dir);
    let mut sink = CsvSink::create(&path)?;
    sink.write_header(&columns)?;
    sink.write_row(&extract_values(&first))?;

    let mut rows_skipped = 0u64;
    for (offset, item) in messages.enumerate() {
        let index = offset + 1;
        let failure = match item {
            Ok(msg) => {
                let values = extract_values(&msg);
                if values.len() == columns.len() {
                    sink.write_row(&values)?;
                    None
                } else {
                    Some(format!(
                        "{} values for {} columns (type {})",
                        values.len(),
                        columns.len(),
                        msg.type_name
                    ))
                }
            }
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = failure {
            match settings.row_error_policy {
                RowErrorPolicy::Skip => {
                    tracing::warn!("{}: skipping message #{}: {}", topic, index, reason);
                    rows_skipped += 1;
                }
                RowErrorPolicy::Abort => {
                    let written = sink.rows();
                    sink.finish()?;
                    tracing::error!(
                        "{}: aborting at message #{} after {} rows",
                        topic,
                        index,
                        written
                    );
                    return Err(ExportError::RowExtraction {
                        topic: topic.to_string(),
                        index,
                        reason,
                    });
                }
            }
        }

        if let Some(n) = settings.log_every
            && sink.rows() % n == 0
        {
            tracing::debug!("{}: {} rows written", topic, sink.rows());
        }
    }

    let rows_written = sink.rows();
    let path = sink.finish()?;
    Ok(TopicReport {
        topic: topic.to_string(),
        path,
        columns: columns.len(),
        rows_written,
        rows_skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{Message, Value};
    use crate::error::DecodeError;
    use crate::log_reader::MemoryLog;
    use tempfile::TempDir;

    fn point(x: f64, y: f64, tag: &str) -> Message {
        Message::new("demo/Tagged")
            .with_field(
                "pose",
                Value::Message(
                    Message::new("demo/Pose2")
                        .with_field("x", Value::Float(x))
                        .with_field("y", Value::Float(y)),
                ),
            )
            .with_field("id", Value::Text(tag.to_string()))
    }

    #[test]
    fn test_filename_for() {
        let out = Path::new("out");
        assert_eq!(filename_for("/a/b/topic", out), Path::new("out/topic_generated.csv"));
        assert_eq!(filename_for("topic", out), Path::new("out/topic_generated.csv"));
        assert_eq!(filename_for("/a/b/", out), Path::new("out/_generated.csv"));
    }

    #[test]
    fn test_export_writes_every_message() {
        let dir = TempDir::new().unwrap();
        let mut log = MemoryLog::new();
        log.push("/robot/pose", point(1.0, 2.0, "a"))
            .push("/robot/pose", point(3.0, 4.0, "b,c"));

        let settings = ExportSettings::new(dir.path());
        let report = export_topic(&log, "/robot/pose", &settings).unwrap();

        assert_eq!(report.rows_written, 2);
        assert_eq!(report.columns, 3);
        assert!(!report.is_partial());
        assert_eq!(report.path, dir.path().join("pose_generated.csv"));

        let content = std::fs::read_to_string(&report.path).unwrap();
        assert_eq!(content, "pose.x,pose.y,id\n1.0,2.0,a\n3.0,4.0,\"b,c\"\n");
    }

    #[test]
    fn test_empty_topic_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let mut log = MemoryLog::new();
        log.add_topic("/quiet", "std_msgs/String");

        let err = export_topic(&log, "/quiet", &ExportSettings::new(dir.path())).unwrap_err();
        assert!(matches!(err, ExportError::EmptyTopic(_)));
        assert!(!dir.path().join("quiet_generated.csv").exists());
    }

    #[test]
    fn test_message_without_fields_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let mut log = MemoryLog::new();
        log.push("/tick", Message::new("std_msgs/Empty"))
            .push("/tick", Message::new("std_msgs/Empty"));

        let err = export_topic(&log, "/tick", &ExportSettings::new(dir.path())).unwrap_err();
        assert!(matches!(err, ExportError::Structural { .. }));
        assert!(err.to_string().contains("std_msgs/Empty"));
        assert!(!dir.path().join("tick_generated.csv").exists());
    }

    #[test]
    fn test_unreadable_first_message_is_structural() {
        let dir = TempDir::new().unwrap();
        let mut log = MemoryLog::new();
        log.add_topic("/bad", "demo/Tagged")
            .push_error("/bad", DecodeError::UnknownType("demo/Missing".into()));

        let err = export_topic(&log, "/bad", &ExportSettings::new(dir.path())).unwrap_err();
        assert!(matches!(err, ExportError::Structural { .. }));
    }

    #[test]
    fn test_skip_policy_marks_partial() {
        let dir = TempDir::new().unwrap();
        let mut log = MemoryLog::new();
        log.push("/t", point(1.0, 1.0, "a"))
            .push_error(
                "/t",
                DecodeError::Truncated {
                    needed: 8,
                    offset: 4,
                    len: 6,
                },
            )
            .push("/t", point(2.0, 2.0, "c"));

        let report = export_topic(&log, "/t", &ExportSettings::new(dir.path())).unwrap();
        assert_eq!(report.rows_written, 2);
        assert_eq!(report.rows_skipped, 1);
        assert!(report.is_partial());
    }

    #[test]
    fn test_abort_policy_keeps_rows_before_failure() {
        let dir = TempDir::new().unwrap();
        let mut log = MemoryLog::new();
        log.push("/t", point(1.0, 1.0, "a"))
            .push("/t", point(2.0, 2.0, "b"))
            .push_error("/t", DecodeError::Record("bad chunk".into()))
            .push("/t", point(3.0, 3.0, "c"));

        let mut settings = ExportSettings::new(dir.path());
        settings.row_error_policy = RowErrorPolicy::Abort;
        let err = export_topic(&log, "/t", &settings).unwrap_err();
        assert!(matches!(err, ExportError::RowExtraction { index: 2, .. }));

        let content = std::fs::read_to_string(dir.path().join("t_generated.csv")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_shape_change_is_a_row_error() {
        let dir = TempDir::new().unwrap();
        let mut log = MemoryLog::new();
        log.push("/t", point(1.0, 1.0, "a")).push(
            "/t",
            Message::new("demo/Other").with_field("only", Value::Bool(true)),
        );

        let report = export_topic(&log, "/t", &ExportSettings::new(dir.path())).unwrap();
        assert_eq!(report.rows_written, 1);
        assert_eq!(report.rows_skipped, 1);
    }

    #[test]
    fn test_existing_file_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t_generated.csv");
        std::fs::write(&path, "stale\nstale\nstale\nstale\n").unwrap();

        let mut log = MemoryLog::new();
        log.push("/t", point(1.0, 1.0, "a"));
        export_topic(&log, "/t", &ExportSettings::new(dir.path())).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "pose.x,pose.y,id\n1.0,1.0,a\n");
    }
}
