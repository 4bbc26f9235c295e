use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use bag2csv::cli::{normalize_legacy_args, Cli, Commands};
use bag2csv::{convert, rosbags_io, schema, validate};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse_from(normalize_legacy_args(std::env::args()));
    match cli.command {
        Some(Commands::Inspect { bag }) => rosbags_io::inspect_bag(&bag),
        Some(Commands::Columns { bag, include }) => schema::print_columns(&bag, &include),
        Some(Commands::Validate { csv }) => validate::validate_csv(&csv),
        None => {
            let args = cli.export;
            let options = convert::ConvertOptions {
                bag_path: args.orig.ok_or_else(|| anyhow!("--orig is required"))?,
                output_dir: args.dest.ok_or_else(|| anyhow!("--dest is required"))?,
                include_topics: args.include,
                exclude_topics: args.exclude,
                row_error_policy: args.on_row_error,
                dry_run: args.dry_run,
                show_progress: args.progress,
                report_path: args.report,
            };
            let summary = convert::convert_bag(&options)?;

            for failure in &summary.failed {
                eprintln!("[bag2csv][failed] {} ({}): {}", failure.topic, failure.kind, failure.error);
            }
            for report in summary.partial() {
                eprintln!(
                    "[bag2csv][partial] {}: {} rows written, {} skipped",
                    report.topic, report.rows_written, report.rows_skipped
                );
            }
            if !summary.is_success() {
                return Err(anyhow!(
                    "{} of {} topics did not export cleanly",
                    summary.failed.len() + summary.partial().count(),
                    summary.failed.len() + summary.exported.len()
                ));
            }
            Ok(())
        }
    }
}
