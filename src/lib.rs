//! bag2csv - Convert ROS1 .bag files into per-topic CSV files
//!
//! Every topic of a bag becomes one `<last topic segment>_generated.csv`
//! file. The columns are derived from the first message on the topic by
//! flattening nested messages into dotted names, so a
//! `geometry_msgs/PoseStamped` topic yields `header.seq`,
//! `header.stamp.secs`, ..., `pose.orientation.w`.
//!
//! # Features
//!
//! - **Any message type**: decoded from the message definition stored in the bag
//! - **Nested messages**: expanded depth first, `time`/`duration` as `secs`/`nsecs`
//! - **Arrays**: kept as a single column, e.g. `"[0.0, 0.1, 0.2]"`
//! - **Isolation**: one broken topic never stops the others
//! - **Row policy**: skip or abort on messages that cannot be decoded
//!
//! # Example
//!
//! ```rust,no_run
//! use bag2csv::{convert_bag, ConvertOptions, RowErrorPolicy};
//!
//! let options = ConvertOptions {
//!     bag_path: "input.bag".to_string(),
//!     output_dir: "csvs".to_string(),
//!     include_topics: vec![],
//!     exclude_topics: vec![],
//!     row_error_policy: RowErrorPolicy::Skip,
//!     dry_run: false,
//!     show_progress: true,
//!     report_path: None,
//! };
//!
//! let summary = convert_bag(&options)?;
//! assert!(summary.is_success());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod convert;
pub mod csv_writer;
pub mod decode;
pub mod error;
pub mod export;
pub mod flatten;
pub mod log_reader;
pub mod msg_def;
pub mod rosbags_io;
pub mod schema;
pub mod validate;

// Re-export main types for convenience
pub use convert::{convert_bag, ConvertOptions, RunSummary};
pub use decode::{Message, Value};
pub use error::{DecodeError, ExportError};
pub use export::{export_topic, filename_for, ExportSettings, RowErrorPolicy, TopicReport};
pub use flatten::{extract_values, flatten_schema};
pub use log_reader::{LogReader, MemoryLog};
pub use rosbags_io::{inspect_bag, RosBagReader};
