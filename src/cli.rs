use clap::{ArgAction, Args, Parser, Subcommand};

use crate::export::RowErrorPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "bag2csv",
    about = "Convert ROS1 bag files into one CSV file per topic",
    version,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments of the default action: export every topic of a bag
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path to the .bag file
    #[arg(long = "orig", required = true)]
    pub orig: Option<String>,
    /// Directory for the generated <topic>_generated.csv files
    #[arg(long = "dest", required = true)]
    pub dest: Option<String>,
    /// Include only these topics (can be repeated)
    #[arg(long = "include", action = ArgAction::Append)]
    pub include: Vec<String>,
    /// Exclude these topics (can be repeated)
    #[arg(long = "exclude", action = ArgAction::Append)]
    pub exclude: Vec<String>,
    /// What to do with a message that cannot be written as a row
    #[arg(long = "on-row-error", value_enum, default_value_t = RowErrorPolicy::Skip)]
    pub on_row_error: RowErrorPolicy,
    /// Dry-run: show the planned files but do not write any
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Show progress bar
    #[arg(long = "progress", action = ArgAction::SetTrue)]
    pub progress: bool,
    /// Write a JSON summary of the run to this path
    #[arg(long = "report")]
    pub report: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List topics, types, message counts and time span of a bag
    Inspect {
        /// Path to the .bag file
        bag: String,
    },

    /// Show the output file and flattened columns of each topic
    Columns {
        /// Path to the .bag file
        bag: String,
        /// Include only these topics (can be repeated)
        #[arg(long = "include", action = ArgAction::Append)]
        include: Vec<String>,
    },

    /// Check that a generated .csv file has a consistent shape
    Validate { csv: String },
}

/// Accept the historical single-dash spellings `-orig` and `-dest`
pub fn normalize_legacy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| match arg.as_str() {
            "-orig" => "--orig".to_string(),
            "-dest" => "--dest".to_string(),
            _ => arg,
        })
        .collect()
}
