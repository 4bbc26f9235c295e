use anyhow::{Context, Result};
use prettytable::{format, row, Table};
use rosbag::{ChunkRecord, MessageRecord, RosBag};
use std::collections::{BTreeMap, HashSet};

use crate::decode::decode_message;
use crate::error::{DecodeError, ExportError};
use crate::log_reader::{LogReader, MessageStream, TopicInfo};
use crate::msg_def::MessageSchema;

#[derive(Debug, Clone)]
struct ConnectionInfo {
    topic: String,
    msg_type: String,
    definition: String,
}

/// [`LogReader`] over a ROS1 bag file
pub struct RosBagReader {
    bag: RosBag,
    connections: BTreeMap<u32, ConnectionInfo>,
    topics: BTreeMap<String, TopicInfo>,
}

impl RosBagReader {
    /// Open the bag and index its connections and per-topic statistics.
    /// Any malformed chunk found here makes the whole bag unusable.
    pub fn open(path: &str) -> Result<Self, ExportError> {
        let open_err = |reason: String| ExportError::LogOpen {
            path: path.to_string(),
            reason,
        };
        let bag = RosBag::new(path).map_err(|e| open_err(e.to_string()))?;
        let connections = scan_connections(&bag).map_err(|e| open_err(format!("{e:#}")))?;
        let topics = scan_topics(&bag, &connections).map_err(|e| open_err(format!("{e:#}")))?;
        tracing::debug!(
            "opened {}: {} connections, {} topics",
            path,
            connections.len(),
            topics.len()
        );
        Ok(Self {
            bag,
            connections,
            topics,
        })
    }

    /// Raw payloads of the given connections, in chunk order
    fn payloads(&self, conn_ids: &HashSet<u32>) -> Vec<Result<Vec<u8>, DecodeError>> {
        let mut out = Vec::new();
        for record in self.bag.chunk_records() {
            let chunk = match record {
                Ok(ChunkRecord::Chunk(chunk)) => chunk,
                Ok(_) => continue,
                Err(e) => {
                    out.push(Err(DecodeError::Record(e.to_string())));
                    break;
                }
            };
            for msg in chunk.messages() {
                match msg {
                    Ok(MessageRecord::MessageData(data)) if conn_ids.contains(&data.conn_id) => {
                        out.push(Ok(data.data.to_vec()));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        out.push(Err(DecodeError::Record(e.to_string())));
                        break;
                    }
                }
            }
        }
        out
    }
}

impl LogReader for RosBagReader {
    fn topics(&self) -> BTreeMap<String, TopicInfo> {
        self.topics.clone()
    }

    fn messages(&self, topic: &str) -> Result<MessageStream<'_>, ExportError> {
        let conn_ids: HashSet<u32> = self
            .connections
            .iter()
            .filter(|(_, c)| c.topic == topic)
            .map(|(id, _)| *id)
            .collect();

        // every connection of a topic carries the same type
        let conn = self
            .connections
            .values()
            .find(|c| c.topic == topic)
            .ok_or_else(|| ExportError::Structural {
                topic: topic.to_string(),
                reason: "no connection record for topic".to_string(),
            })?;
        let schema =
            MessageSchema::parse(&conn.msg_type, &conn.definition).map_err(|e| {
                ExportError::Structural {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let payloads = self.payloads(&conn_ids);
        Ok(Box::new(payloads.into_iter().map(move |payload| {
            payload.and_then(|bytes| decode_message(&schema, &bytes))
        })))
    }
}

fn scan_connections(bag: &RosBag) -> Result<BTreeMap<u32, ConnectionInfo>> {
    let mut connections = BTreeMap::new();
    for record in bag.chunk_records() {
        if let ChunkRecord::Chunk(chunk) = record? {
            for msg in chunk.messages() {
                if let MessageRecord::Connection(conn) = msg? {
                    connections.insert(
                        conn.id,
                        ConnectionInfo {
                            topic: conn.topic.to_string(),
                            msg_type: conn.tp.to_string(),
                            definition: conn.message_definition.to_string(),
                        },
                    );
                }
            }
        }
    }
    Ok(connections)
}

fn scan_topics(
    bag: &RosBag,
    connections: &BTreeMap<u32, ConnectionInfo>,
) -> Result<BTreeMap<String, TopicInfo>> {
    let mut topics: BTreeMap<String, TopicInfo> = BTreeMap::new();
    for conn in connections.values() {
        topics.entry(conn.topic.clone()).or_insert_with(|| TopicInfo {
            msg_type: conn.msg_type.clone(),
            ..TopicInfo::default()
        });
    }

    for record in bag.chunk_records() {
        if let ChunkRecord::Chunk(chunk) = record? {
            for msg in chunk.messages() {
                if let MessageRecord::MessageData(data) = msg?
                    && let Some(conn) = connections.get(&data.conn_id)
                    && let Some(info) = topics.get_mut(&conn.topic)
                {
                    info.message_count += 1;
                    info.first_ns = Some(info.first_ns.map_or(data.time, |t| t.min(data.time)));
                    info.last_ns = Some(info.last_ns.map_or(data.time, |t| t.max(data.time)));
                }
            }
        }
    }
    Ok(topics)
}

/// Print topics, types, message counts and time span of a bag
pub fn inspect_bag(path: &str) -> Result<()> {
    let reader = RosBagReader::open(path).with_context(|| format!("failed to inspect bag: {}", path))?;
    let topics = reader.topics();

    let bag_start = topics.values().filter_map(|t| t.first_ns).min();
    let bag_end = topics.values().filter_map(|t| t.last_ns).max();
    let total: u64 = topics.values().map(|t| t.message_count).sum();
    let rel = |ns: Option<u64>| match (ns, bag_start) {
        (Some(ns), Some(start)) => ns.saturating_sub(start) as f64 / 1_000_000_000.0,
        _ => 0.0,
    };

    println!("Bag: {}", path);
    println!(
        "Duration (s): {:.6}, Topics: {}, Total messages: {}\n",
        rel(bag_end),
        topics.len(),
        total
    );

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row!["Topic", "Type", "Count", "Start(s)", "End(s)"]);
    for (topic, info) in &topics {
        table.add_row(row![
            topic,
            info.msg_type,
            info.message_count,
            format!("{:.6}", rel(info.first_ns)),
            format!("{:.6}", rel(info.last_ns))
        ]);
    }
    table.printstd();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::run_export;
    use crate::decode::Value;
    use crate::export::ExportSettings;
    use std::path::Path;
    use tempfile::TempDir;

    // Bag layout: magic, bag header record, then one uncompressed chunk of
    // connection and message records. The index section is left empty.

    fn field(name: &str, value: &[u8]) -> Vec<u8> {
        let mut out = ((name.len() + 1 + value.len()) as u32).to_le_bytes().to_vec();
        out.extend_from_slice(name.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value);
        out
    }

    fn record(header: &[Vec<u8>], data: &[u8]) -> Vec<u8> {
        let header = header.concat();
        let mut out = (header.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&header);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn connection(id: u32, topic: &str, msg_type: &str, definition: &str) -> Vec<u8> {
        let data = [
            field("topic", topic.as_bytes()),
            field("type", msg_type.as_bytes()),
            field("md5sum", &[b'0'; 32]),
            field("message_definition", definition.as_bytes()),
        ]
        .concat();
        record(
            &[
                field("op", &[0x07]),
                field("conn", &id.to_le_bytes()),
                field("topic", topic.as_bytes()),
            ],
            &data,
        )
    }

    fn message(conn: u32, secs: u32, payload: &[u8]) -> Vec<u8> {
        let mut time = secs.to_le_bytes().to_vec();
        time.extend_from_slice(&0u32.to_le_bytes());
        record(
            &[
                field("op", &[0x02]),
                field("conn", &conn.to_le_bytes()),
                field("time", &time),
            ],
            payload,
        )
    }

    fn write_bag(path: &Path, conn_count: u32, records: &[Vec<u8>]) {
        let inner = records.concat();
        let chunk = record(
            &[
                field("op", &[0x05]),
                field("compression", b"none"),
                field("size", &(inner.len() as u32).to_le_bytes()),
            ],
            &inner,
        );
        let bag_header = |index_pos: u64| {
            record(
                &[
                    field("op", &[0x03]),
                    field("index_pos", &index_pos.to_le_bytes()),
                    field("conn_count", &conn_count.to_le_bytes()),
                    field("chunk_count", &1u32.to_le_bytes()),
                ],
                &[],
            )
        };

        let magic = b"#ROSBAG V2.0\n";
        let index_pos = (magic.len() + bag_header(0).len() + chunk.len()) as u64;
        let mut bytes = magic.to_vec();
        bytes.extend(bag_header(index_pos));
        bytes.extend(chunk);
        std::fs::write(path, bytes).unwrap();
    }

    fn point(x: f64, y: f64) -> Vec<u8> {
        [x.to_le_bytes(), y.to_le_bytes()].concat()
    }

    fn string_payload(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn sample_bag(dir: &TempDir) -> String {
        let path = dir.path().join("sample.bag");
        write_bag(
            &path,
            3,
            &[
                connection(0, "/robot/pose", "demo/Point2", "float64 x\nfloat64 y\n"),
                connection(1, "/robot/status", "std_msgs/String", "string data\n"),
                connection(2, "/robot/broken", "demo/Broken", "this is not a field\n"),
                message(0, 10, &point(1.0, 2.0)),
                message(1, 11, &string_payload("ok, ready")),
                message(0, 12, &point(3.0, 4.0)),
                message(0, 13, &[0, 1, 2]),
                message(2, 13, &[]),
            ],
        );
        path.display().to_string()
    }

    #[test]
    fn test_open_collects_topic_stats() {
        let dir = TempDir::new().unwrap();
        let reader = RosBagReader::open(&sample_bag(&dir)).unwrap();
        let topics = reader.topics();

        assert_eq!(
            topics.keys().collect::<Vec<_>>(),
            vec!["/robot/broken", "/robot/pose", "/robot/status"]
        );
        let pose = &topics["/robot/pose"];
        assert_eq!(pose.msg_type, "demo/Point2");
        assert_eq!(pose.message_count, 3);
        assert_eq!(pose.first_ns, Some(10_000_000_000));
        assert_eq!(pose.last_ns, Some(13_000_000_000));
        assert_eq!(topics["/robot/status"].message_count, 1);
    }

    #[test]
    fn test_messages_are_decoded_in_log_order() {
        let dir = TempDir::new().unwrap();
        let reader = RosBagReader::open(&sample_bag(&dir)).unwrap();

        let items: Vec<_> = reader.messages("/robot/pose").unwrap().collect();
        assert_eq!(items.len(), 3);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.type_name, "demo/Point2");
        assert_eq!(first.field("x"), Some(&Value::Float(1.0)));
        assert_eq!(items[1].as_ref().unwrap().field("y"), Some(&Value::Float(4.0)));
        assert!(matches!(items[2], Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_bad_definition_is_structural() {
        let dir = TempDir::new().unwrap();
        let reader = RosBagReader::open(&sample_bag(&dir)).unwrap();
        assert!(matches!(
            reader.messages("/robot/broken"),
            Err(ExportError::Structural { .. })
        ));
    }

    #[test]
    fn test_unreadable_bag_is_log_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.bag");
        std::fs::write(&path, b"not a bag").unwrap();
        assert!(matches!(
            RosBagReader::open(&path.display().to_string()),
            Err(ExportError::LogOpen { .. })
        ));
    }

    #[test]
    fn test_bag_exports_to_csv() {
        let dir = TempDir::new().unwrap();
        let reader = RosBagReader::open(&sample_bag(&dir)).unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let topics = vec!["/robot/pose".to_string(), "/robot/status".to_string()];
        let summary = run_export(&reader, &topics, &ExportSettings::new(&out), None);

        // the truncated third pose is skipped
        assert_eq!(summary.partial().count(), 1);
        let pose = std::fs::read_to_string(out.join("pose_generated.csv")).unwrap();
        assert_eq!(pose, "x,y\n1.0,2.0\n3.0,4.0\n");
        let status = std::fs::read_to_string(out.join("status_generated.csv")).unwrap();
        assert_eq!(status, "data\n\"ok, ready\"\n");
    }
}
