//! Columns command - Print the flattened layout of every topic

use anyhow::{Context, Result};
use prettytable::{format, row, Table};
use std::path::Path;

use crate::convert::select_topics;
use crate::export::filename_for;
use crate::flatten::flatten_schema;
use crate::log_reader::LogReader;
use crate::rosbags_io::RosBagReader;

/// Flattened layout of one topic, derived from its first message
#[derive(Debug, Clone, PartialEq)]
pub struct TopicColumns {
    pub topic: String,
    pub msg_type: String,
    pub file_name: String,
    pub columns: Vec<String>,
}

/// Column layout per topic. Topics whose first message cannot be read are
/// returned as errors in the second list.
pub fn topic_columns<R: LogReader + ?Sized>(
    reader: &R,
    topics: &[String],
) -> (Vec<TopicColumns>, Vec<(String, String)>) {
    let infos = reader.topics();
    let mut layouts = Vec::new();
    let mut errors = Vec::new();

    for topic in topics {
        let first = reader
            .messages(topic)
            .map_err(|e| e.to_string())
            .and_then(|mut stream| match stream.next() {
                Some(Ok(msg)) => Ok(msg),
                Some(Err(e)) => Err(e.to_string()),
                None => Err("no messages".to_string()),
            });
        match first {
            Ok(msg) => layouts.push(TopicColumns {
                topic: topic.clone(),
                msg_type: infos
                    .get(topic)
                    .map_or_else(|| msg.type_name.clone(), |i| i.msg_type.clone()),
                file_name: filename_for(topic, Path::new(""))
                    .display()
                    .to_string(),
                columns: flatten_schema(&msg),
            }),
            Err(e) => errors.push((topic.clone(), e)),
        }
    }

    (layouts, errors)
}

/// Print the output file and columns of every selected topic in a bag
pub fn print_columns(bag: &str, include: &[String]) -> Result<()> {
    let reader = RosBagReader::open(bag).with_context(|| format!("failed to open bag: {}", bag))?;
    let topics = select_topics(&reader.topics(), include, &[]);
    let (layouts, errors) = topic_columns(&reader, &topics);

    println!("Bag: {}\n", bag);
    columns_table(&layouts, &errors).printstd();

    Ok(())
}

/// One row per topic, columns stacked one per line in the last cell
fn columns_table(layouts: &[TopicColumns], errors: &[(String, String)]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row!["Topic", "Type", "File", "Columns"]);
    for layout in layouts {
        table.add_row(row![
            layout.topic,
            layout.msg_type,
            layout.file_name,
            layout.columns.join("\n")
        ]);
    }
    for (topic, err) in errors {
        table.add_row(row![topic, "", "", format!("[unavailable] {}", err)]);
    }
    table
}
