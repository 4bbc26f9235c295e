//! The log container seen by the exporter
//!
//! [`LogReader`] is the only thing the exporter needs from a bag: the topic
//! list and a forward-only message stream per topic. [`crate::rosbags_io::RosBagReader`]
//! implements it for ROS1 bags; [`MemoryLog`] holds already-decoded messages.

use std::collections::BTreeMap;

use crate::decode::Message;
use crate::error::{DecodeError, ExportError};

/// Forward-only stream of decoded messages for one topic. A failing item
/// does not end the stream.
pub type MessageStream<'a> = Box<dyn Iterator<Item = Result<Message, DecodeError>> + 'a>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicInfo {
    pub msg_type: String,
    pub message_count: u64,
    /// Receive time of the first message, nanoseconds since epoch
    pub first_ns: Option<u64>,
    pub last_ns: Option<u64>,
}

pub trait LogReader {
    /// All topics in the log, keyed and ordered by topic path
    fn topics(&self) -> BTreeMap<String, TopicInfo>;

    /// Messages recorded on `topic`, in log order.
    ///
    /// Fails up front with [`ExportError::Structural`] when the topic's
    /// message type cannot be introspected.
    fn messages(&self, topic: &str) -> Result<MessageStream<'_>, ExportError>;
}

/// In-memory log, handy for feeding the exporter without a bag on disk
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    topics: BTreeMap<String, (String, Vec<Result<Message, DecodeError>>)>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic, possibly with no messages yet
    pub fn add_topic(&mut self, topic: &str, msg_type: &str) -> &mut Self {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| (msg_type.to_string(), Vec::new()));
        self
    }

    pub fn push(&mut self, topic: &str, msg: Message) -> &mut Self {
        let msg_type = msg.type_name.clone();
        self.add_topic(topic, &msg_type);
        if let Some((_, messages)) = self.topics.get_mut(topic) {
            messages.push(Ok(msg));
        }
        self
    }

    /// Record a message that fails to decode on an already registered topic
    pub fn push_error(&mut self, topic: &str, err: DecodeError) -> &mut Self {
        if let Some((_, messages)) = self.topics.get_mut(topic) {
            messages.push(Err(err));
        }
        self
    }
}

impl LogReader for MemoryLog {
    fn topics(&self) -> BTreeMap<String, TopicInfo> {
        self.topics
            .iter()
            .map(|(topic, (msg_type, messages))| {
                let info = TopicInfo {
                    msg_type: msg_type.clone(),
                    message_count: messages.len() as u64,
                    first_ns: None,
                    last_ns: None,
                };
                (topic.clone(), info)
            })
            .collect()
    }

    fn messages(&self, topic: &str) -> Result<MessageStream<'_>, ExportError> {
        let (_, messages) = self.topics.get(topic).ok_or_else(|| ExportError::Structural {
            topic: topic.to_string(),
            reason: "topic not present in log".to_string(),
        })?;
        Ok(Box::new(messages.iter().cloned()))
    }
}
