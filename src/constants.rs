//! Centralized protocol and configuration constants.
//!
//! # Categories
//!
//! - **Configuration defaults**: values applied when a `send-to-kafka`
//!   section leaves a key out
//! - **Kafka message format**: limits of the payload published per transaction
//! - **DHCPv6**: message type and option codes the envelope parser needs
//! - **Kafka wire protocol**: API keys, versions and record batch layout
//! - **Producer tuning**: queue sizes and timeouts

// =============================================================================
// Configuration Defaults
// =============================================================================

/// Topic used when the section has no `topic` key.
pub const DEFAULT_TOPIC: &str = "dhcpkit.messages";

/// Broker used when the section has no `broker` key.
pub const DEFAULT_BROKER: &str = "localhost:9092";

/// Port used for a broker address that doesn't name one.
pub const DEFAULT_BROKER_PORT: u16 = 9092;

/// Host used for a connection address that only names a port.
pub const DEFAULT_CONNECTION_HOST: &str = "127.0.0.1";

/// Maximum length of a Kafka topic name.
pub const TOPIC_MAX_LENGTH: usize = 255;

/// Characters allowed in a Kafka topic name besides ASCII letters and digits.
pub const TOPIC_EXTRA_CHARS: &str = "._-";

/// Maximum length of a host name (RFC 1123).
pub const HOSTNAME_MAX_LENGTH: usize = 253;

/// Maximum length of a single host name label.
pub const HOSTNAME_LABEL_MAX_LENGTH: usize = 63;

// =============================================================================
// Kafka Message Format
// =============================================================================

/// Message type of a [`DhcpKafkaMessage`](crate::messages::DhcpKafkaMessage).
pub const DHCP_MESSAGE: u8 = 1;

/// The server name is prefixed with a one byte length.
pub const MAX_SERVER_NAME_LENGTH: usize = u8::MAX as usize;

/// Embedded DHCPv6 messages are prefixed with a two byte length.
pub const MAX_EMBEDDED_MESSAGE_LENGTH: usize = u16::MAX as usize;

// =============================================================================
// DHCPv6
// =============================================================================

/// Size of the fixed part of a client/server message (type + transaction id).
pub const DHCPV6_CLIENT_SERVER_HEADER_SIZE: usize = 4;

/// Size of the fixed part of a relay message (type + hop count + two addresses).
pub const DHCPV6_RELAY_HEADER_SIZE: usize = 34;

/// Size of an option header (code + length).
pub const DHCPV6_OPTION_HEADER_SIZE: usize = 4;

/// The Relay Message option, which carries a nested DHCPv6 message.
pub const OPTION_RELAY_MSG: u16 = 9;

/// Relay messages nest at most this deep (RFC 8415 HOP_COUNT_LIMIT + the client message).
pub const MAX_RELAY_DEPTH: usize = 33;

// =============================================================================
// Kafka Wire Protocol
// =============================================================================

/// API key of the Produce request.
pub const API_KEY_PRODUCE: i16 = 0;

/// API key of the Metadata request.
pub const API_KEY_METADATA: i16 = 3;

/// Produce request version sent by the producer (first version with record batches v2).
pub const PRODUCE_VERSION: i16 = 3;

/// Metadata request version sent by the producer.
pub const METADATA_VERSION: i16 = 1;

/// Magic byte of a v2 record batch.
pub const RECORD_BATCH_MAGIC: i8 = 2;

/// Size of the fixed record batch header that precedes the records.
///
/// baseOffset (8) + batchLength (4) + partitionLeaderEpoch (4) + magic (1) +
/// crc (4) + attributes (2) + lastOffsetDelta (4) + firstTimestamp (8) +
/// maxTimestamp (8) + producerId (8) + producerEpoch (2) + baseSequence (4) +
/// recordCount (4)
pub const MIN_BATCH_HEADER_SIZE: usize = 61;

/// Offset of the batchLength field; the length counts everything after it.
pub const BATCH_LENGTH_OFFSET: usize = 8;

/// Offset of the CRC field (4 bytes, u32 big-endian).
pub const BATCH_CRC_OFFSET: usize = 17;

/// Start of the CRC-covered region (attributes field).
pub const BATCH_CRC_DATA_START: usize = 21;

/// Maximum array size accepted when parsing a response.
pub const MAX_PROTOCOL_ARRAY_SIZE: i32 = 100_000;

/// Maximum response size accepted from a broker.
pub const MAX_RESPONSE_SIZE: usize = 100 * 1024 * 1024;

/// Client id sent in every request header.
pub const CLIENT_ID: &str = "dhcpkit-kafka";

// =============================================================================
// Producer Tuning
// =============================================================================

/// Minimum time between two connection attempts of a handler.
pub const RECONNECT_INTERVAL_SECS: u64 = 5;

/// Number of payloads the producer queues before it starts dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Timeout for establishing a TCP connection to a broker.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for a single request/response round trip.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Time a stopping producer gets to send what is still queued.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Time the broker may take to acknowledge a produce request.
pub const DEFAULT_PRODUCE_TIMEOUT_MS: i32 = 10_000;

/// Acknowledgement level of produce requests (leader only).
pub const DEFAULT_ACKS: i16 = 1;
