//! Messages that are published on Kafka.
//!
//! Every payload starts with a one byte message type. The type selects the
//! decoder through the [`KafkaMessageRegistry`]; payloads of an unregistered
//! type decode as [`UnknownKafkaMessage`] so they can still be re-encoded
//! unchanged.
//!
//! ```rust
//! use dhcpkit_kafka::messages::{DhcpKafkaMessage, KafkaMessage};
//!
//! let message = DhcpKafkaMessage {
//!     server_name: "dhcp1.example.com".to_string(),
//!     timestamp_in: 12345.0,
//!     ..Default::default()
//! };
//! let payload = message.save().unwrap();
//!
//! let (length, parsed) = KafkaMessage::parse(&payload).unwrap();
//! assert_eq!(length, payload.len());
//! assert_eq!(parsed, KafkaMessage::Dhcp(message));
//! ```

mod dhcp;
mod registry;
mod unknown;

pub use dhcp::DhcpKafkaMessage;
pub use registry::{KafkaMessageRegistry, LoadFn, RegistryEntry, kafka_message_registry};
pub use unknown::UnknownKafkaMessage;

use bytes::Bytes;

use crate::error::Result;

/// A decoded Kafka message.
#[derive(Debug, Clone, PartialEq)]
pub enum KafkaMessage {
    Dhcp(DhcpKafkaMessage),
    Unknown(UnknownKafkaMessage),
}

impl KafkaMessage {
    /// Decode the message at the start of `buffer` using the global registry.
    ///
    /// Returns the number of bytes used and the message. Data after the
    /// message is ignored.
    pub fn parse(buffer: &[u8]) -> Result<(usize, KafkaMessage)> {
        kafka_message_registry().parse(buffer)
    }

    pub fn message_type(&self) -> u8 {
        match self {
            KafkaMessage::Dhcp(_) => DhcpKafkaMessage::MESSAGE_TYPE,
            KafkaMessage::Unknown(m) => m.message_type,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            KafkaMessage::Dhcp(m) => m.validate(),
            KafkaMessage::Unknown(m) => m.validate(),
        }
    }

    /// Validate and encode the message.
    pub fn save(&self) -> Result<Bytes> {
        match self {
            KafkaMessage::Dhcp(m) => m.save(),
            KafkaMessage::Unknown(m) => m.save(),
        }
    }
}

impl From<DhcpKafkaMessage> for KafkaMessage {
    fn from(message: DhcpKafkaMessage) -> Self {
        KafkaMessage::Dhcp(message)
    }
}

impl From<UnknownKafkaMessage> for KafkaMessage {
    fn from(message: UnknownKafkaMessage) -> Self {
        KafkaMessage::Unknown(message)
    }
}
