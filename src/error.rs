//! Error types shared by the reader, decoder and exporter

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while exporting a bag. Only [`ExportError::LogOpen`] is
/// fatal to a whole run; the others are scoped to a single topic.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to open bag {path}: {reason}")]
    LogOpen { path: String, reason: String },

    #[error("topic {0} has no messages")]
    EmptyTopic(String),

    #[error("topic {topic}: message structure cannot be introspected: {reason}")]
    Structural { topic: String, reason: String },

    #[error("topic {topic}: message #{index} could not be extracted: {reason}")]
    RowExtraction {
        topic: String,
        index: usize,
        reason: String,
    },

    #[error("cannot write {}: {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("topic {topic}: {} was already written by topic {owner}", .path.display())]
    FileCollision {
        topic: String,
        owner: String,
        path: PathBuf,
    },
}

impl ExportError {
    /// Short label used in run reports
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::LogOpen { .. } => "log_open",
            ExportError::EmptyTopic(_) => "empty_topic",
            ExportError::Structural { .. } => "structural",
            ExportError::RowExtraction { .. } => "row_extraction",
            ExportError::FileWrite { .. } => "file_write",
            ExportError::FileCollision { .. } => "file_collision",
        }
    }
}

/// Failures while turning a serialized payload into a [`crate::decode::Message`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("payload too short: need {needed} bytes at offset {offset}, payload is {len} bytes")]
    Truncated {
        needed: usize,
        offset: usize,
        len: usize,
    },

    #[error("unknown message type {0}")]
    UnknownType(String),

    #[error("malformed record: {0}")]
    Record(String),
}
