use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::export::{ExportSettings, RowErrorPolicy, TopicReport, export_topic, filename_for};
use crate::log_reader::{LogReader, TopicInfo};
use crate::rosbags_io::RosBagReader;

/// Options for converting a ROS bag file to per-topic CSV files
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Path to the input .bag file
    pub bag_path: String,
    /// Directory receiving the `<topic>_generated.csv` files
    pub output_dir: String,
    /// Include only these topics (empty means include all)
    pub include_topics: Vec<String>,
    /// Exclude these topics
    pub exclude_topics: Vec<String>,
    /// What to do with a message that cannot become a row
    pub row_error_policy: RowErrorPolicy,
    /// Dry run: show plan but don't write output
    pub dry_run: bool,
    /// Show progress bar
    pub show_progress: bool,
    /// Write a JSON summary of the run to this path
    pub report_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicFailure {
    pub topic: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub exported: Vec<TopicReport>,
    pub failed: Vec<TopicFailure>,
}

impl RunSummary {
    /// True when every selected topic exported without dropping rows
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.exported.iter().all(|r| !r.is_partial())
    }

    pub fn partial(&self) -> impl Iterator<Item = &TopicReport> {
        self.exported.iter().filter(|r| r.is_partial())
    }
}

/// Topics to export after applying include/exclude filters, in topic order
pub fn select_topics(
    topics: &BTreeMap<String, TopicInfo>,
    include: &[String],
    exclude: &[String],
) -> Vec<String> {
    let include_set: Option<HashSet<&str>> = if include.is_empty() {
        None
    } else {
        Some(include.iter().map(|s| s.as_str()).collect())
    };
    let exclude_set: HashSet<&str> = exclude.iter().map(|s| s.as_str()).collect();

    topics
        .keys()
        .filter(|t| include_set.as_ref().is_none_or(|inc| inc.contains(t.as_str())))
        .filter(|t| !exclude_set.contains(t.as_str()))
        .cloned()
        .collect()
}

/// Export each topic in turn. A failing topic is recorded and the run moves
/// on to the next one.
///
/// Topics sharing a last segment map to the same file. The first one keeps
/// it and each later one fails with [`ExportError::FileCollision`].
pub fn run_export<R: LogReader + ?Sized>(
    reader: &R,
    topics: &[String],
    settings: &ExportSettings,
    pb: Option<&ProgressBar>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    // output file -> topic that produced it
    let mut claimed: HashMap<PathBuf, &str> = HashMap::new();

    for topic in topics {
        if let Some(pb) = pb {
            pb.set_message(topic.clone());
        }
        let path = filename_for(topic, &settings.output_dir);

        if let Some(owner) = claimed.get(&path) {
            let e = ExportError::FileCollision {
                topic: topic.clone(),
                owner: owner.to_string(),
                path,
            };
            tracing::error!("{}", e);
            summary.failed.push(TopicFailure {
                topic: topic.clone(),
                kind: e.kind(),
                error: e.to_string(),
            });
            if let Some(pb) = pb {
                pb.inc(1);
            }
            continue;
        }
        tracing::info!("Generating {} for {}", path.display(), topic);

        let result = export_topic(reader, topic, settings);
        // an aborted topic keeps the rows it wrote, so it owns the file too
        if matches!(result, Ok(_) | Err(ExportError::RowExtraction { .. })) {
            claimed.insert(path, topic.as_str());
        }
        match result {
            Ok(report) => {
                if report.is_partial() {
                    tracing::warn!(
                        "{}: {} rows written, {} skipped",
                        topic,
                        report.rows_written,
                        report.rows_skipped
                    );
                } else {
                    tracing::info!("{}: {} rows written", topic, report.rows_written);
                }
                summary.exported.push(report);
            }
            Err(e) => {
                match &e {
                    ExportError::EmptyTopic(_) | ExportError::Structural { .. } => {
                        tracing::warn!("skipping {}", e)
                    }
                    _ => tracing::error!("{}", e),
                }
                summary.failed.push(TopicFailure {
                    topic: topic.clone(),
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }

        if let Some(pb) = pb {
            pb.inc(1);
        }
    }

    summary
}

/// Convert a ROS bag file into one CSV file per topic
///
/// Only a bag that cannot be opened (or an output directory that cannot be
/// created) fails the call; per-topic problems end up in the returned
/// [`RunSummary`].
pub fn convert_bag(options: &ConvertOptions) -> Result<RunSummary> {
    let reader = RosBagReader::open(&options.bag_path)
        .with_context(|| format!("failed to open bag: {}", options.bag_path))?;

    let all_topics = reader.topics();
    let topics = select_topics(&all_topics, &options.include_topics, &options.exclude_topics);
    let output_dir = Path::new(&options.output_dir);

    if options.dry_run {
        println!(
            "Plan: {} of {} topics → output: {}",
            topics.len(),
            all_topics.len(),
            output_dir.display()
        );
        for topic in &topics {
            let count = all_topics.get(topic).map_or(0, |t| t.message_count);
            println!(
                "  {} ({} msgs) → {}",
                topic,
                count,
                filename_for(topic, output_dir).display()
            );
        }
        return Ok(RunSummary::default());
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory: {}", output_dir.display()))?;

    let settings = ExportSettings {
        output_dir: output_dir.to_path_buf(),
        row_error_policy: options.row_error_policy,
        log_every: std::env::var("BAG2CSV_LOG_EVERY")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|v| *v > 0),
    };

    let pb = if options.show_progress {
        let pb = ProgressBar::new(topics.len() as u64);
        pb.set_style(ProgressStyle::with_template(
            "{bar:30} {pos}/{len} topics {msg}",
        )?);
        Some(pb)
    } else {
        None
    };

    let summary = run_export(&reader, &topics, &settings, pb.as_ref());

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    tracing::info!(
        "exported {} topics ({} partial), {} failed",
        summary.exported.len(),
        summary.partial().count(),
        summary.failed.len()
    );

    if let Some(report_path) = &options.report_path {
        write_report(&summary, Path::new(report_path))?;
    }

    Ok(summary)
}

fn write_report(summary: &RunSummary, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    tracing::info!("run report written to {}", path.display());
    Ok(())
}
