//! Crate & protocol level errors.
//!
//! - [`Error`]: everything that can go wrong while loading configuration,
//!   encoding or decoding messages, and talking to Kafka
//! - [`KafkaCode`]: error codes reported by a Kafka broker in its responses
//!
//! The handler never passes these on to the DHCPv6 server; a failure to
//! publish a transaction is logged and otherwise ignored.

use bytes::Bytes;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::{io, result};
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, ThisError)]
pub enum Error {
    /// An error in the network.
    #[error("IO error: {0:?}")]
    IoError(io::ErrorKind),

    /// Could not parse the data.
    #[error("Parsing error: invalid data ({} bytes)", .0.len())]
    ParsingError(Bytes),

    /// Missing data or connection closed.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// A value doesn't conform to the message format.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error without a position.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration error at a line of the configuration text.
    #[error("Configuration error on line {line}: {message}")]
    ConfigAt { line: usize, message: String },

    /// The broker answered with an error code.
    #[error("Kafka error: {0:?}")]
    Kafka(KafkaCode),

    /// No broker could be reached or none leads the partition.
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// The broker didn't answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The producer queue is full; the payload was dropped.
    #[error("Producer queue is full")]
    QueueFull,

    /// The producer has been stopped.
    #[error("Producer is closed")]
    Closed,
}

impl Error {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Shorthand for a configuration error at a line.
    pub fn config_at(line: usize, message: impl Into<String>) -> Self {
        Error::ConfigAt {
            line,
            message: message.into(),
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::IoError(a), Error::IoError(b)) => a == b,
            (Error::ParsingError(a), Error::ParsingError(b)) => a == b,
            (Error::MissingData(a), Error::MissingData(b)) => a == b,
            (Error::Validation(a), Error::Validation(b)) => a == b,
            (Error::Config(a), Error::Config(b)) => a == b,
            (
                Error::ConfigAt {
                    line: la,
                    message: ma,
                },
                Error::ConfigAt {
                    line: lb,
                    message: mb,
                },
            ) => la == lb && ma == mb,
            (Error::Kafka(a), Error::Kafka(b)) => a == b,
            (Error::BrokerUnavailable(a), Error::BrokerUnavailable(b)) => a == b,
            (Error::Timeout(a), Error::Timeout(b)) => a == b,
            (Error::QueueFull, Error::QueueFull) => true,
            (Error::Closed, Error::Closed) => true,
            _ => false,
        }
    }
}

impl Eq for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e.kind())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(e.to_string())
    }
}

/// Various errors reported by a remote Kafka server.
/// See also [Kafka Errors](http://kafka.apache.org/protocol.html)
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, Default)]
pub enum KafkaCode {
    /// An unexpected server error
    Unknown = -1,
    #[default]
    None = 0,
    /// This indicates that a message contents does not match its CRC
    CorruptMessage = 2,
    /// This request is for a topic or partition that does not exist
    /// on this broker.
    UnknownTopicOrPartition = 3,
    /// The message has a negative size
    InvalidMessageSize = 4,
    /// There is currently no leader for this partition and hence it is
    /// unavailable for writes.
    LeaderNotAvailable = 5,
    /// The client attempted to send messages to a replica that is not the
    /// leader for some partition. Its metadata is out of date.
    NotLeaderForPartition = 6,
    /// The request exceeded the user-specified time limit.
    RequestTimedOut = 7,
    /// The broker is not alive.
    BrokerNotAvailable = 8,
    /// The produced message is larger than the broker allows.
    MessageSizeTooLarge = 10,
    /// The server disconnected before a response was received.
    NetworkException = 13,
    /// The topic name is illegal or the topic is internal.
    InvalidTopic = 17,
    /// A message batch exceeds the maximum configured segment size.
    RecordListTooLarge = 18,
    /// The number of in-sync replicas is lower than the configured minimum.
    NotEnoughReplicas = 19,
    /// The message was written with fewer in-sync replicas than required.
    NotEnoughReplicasAfterAppend = 20,
    /// The requiredAcks value is invalid.
    InvalidRequiredAcks = 21,
    /// The client is not authorized to access the topic.
    TopicAuthorizationFailed = 29,
    /// The client is not authorized to use the cluster.
    ClusterAuthorizationFailed = 31,
    /// The timestamp of the message is out of acceptable range.
    InvalidTimestamp = 32,
    /// The version of API is not supported.
    UnsupportedVersion = 35,
    /// The message format version on the broker does not support the request.
    UnsupportedForMessageFormat = 43,
    /// The record batch is invalid.
    InvalidRecord = 87,
}

impl KafkaCode {
    /// Map a wire error code, folding unrecognised codes into [`KafkaCode::Unknown`].
    pub fn from_code(code: i16) -> Self {
        KafkaCode::from_i16(code).unwrap_or(KafkaCode::Unknown)
    }

    /// Whether the code signals success.
    pub fn is_ok(self) -> bool {
        self == KafkaCode::None
    }

    /// Whether refreshing metadata and trying again may succeed.
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            KafkaCode::CorruptMessage
                | KafkaCode::UnknownTopicOrPartition
                | KafkaCode::LeaderNotAvailable
                | KafkaCode::NotLeaderForPartition
                | KafkaCode::RequestTimedOut
                | KafkaCode::BrokerNotAvailable
                | KafkaCode::NetworkException
                | KafkaCode::NotEnoughReplicas
                | KafkaCode::NotEnoughReplicasAfterAppend
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_io_error() {
        let err = Error::IoError(io::ErrorKind::ConnectionRefused);
        assert_eq!(err, Error::IoError(io::ErrorKind::ConnectionRefused));
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(err, Error::IoError(io::ErrorKind::TimedOut));
    }

    #[test]
    fn test_error_parsing_error() {
        let data = Bytes::from("bad data");
        let err = Error::ParsingError(data.clone());
        assert_eq!(err, Error::ParsingError(data));
        assert!(err.to_string().contains("8 bytes"));
    }

    #[test]
    fn test_config_at_display() {
        let err = Error::config_at(3, "unknown key 'foo'");
        assert_eq!(
            err.to_string(),
            "Configuration error on line 3: unknown key 'foo'"
        );
    }

    #[test]
    fn test_validation_display() {
        let err = Error::validation("The server name encoded as UTF-8 must be 255 bytes or less");
        assert!(err.to_string().contains("255 bytes or less"));
    }

    #[test]
    fn test_different_variants_not_equal() {
        assert_ne!(Error::QueueFull, Error::Closed);
        assert_ne!(
            Error::Config("x".to_string()),
            Error::Validation("x".to_string())
        );
    }

    #[test]
    fn test_kafka_code_from_code() {
        assert_eq!(KafkaCode::from_code(-1), KafkaCode::Unknown);
        assert_eq!(KafkaCode::from_code(0), KafkaCode::None);
        assert_eq!(KafkaCode::from_code(3), KafkaCode::UnknownTopicOrPartition);
        assert_eq!(KafkaCode::from_code(6), KafkaCode::NotLeaderForPartition);
        assert_eq!(KafkaCode::from_code(29), KafkaCode::TopicAuthorizationFailed);
        assert_eq!(KafkaCode::from_code(999), KafkaCode::Unknown);
    }

    #[test]
    fn test_kafka_code_retriable() {
        assert!(KafkaCode::NotLeaderForPartition.is_retriable());
        assert!(KafkaCode::LeaderNotAvailable.is_retriable());
        assert!(!KafkaCode::TopicAuthorizationFailed.is_retriable());
        assert!(!KafkaCode::MessageSizeTooLarge.is_retriable());
        assert!(KafkaCode::None.is_ok());
        assert!(!KafkaCode::Unknown.is_ok());
    }
}
