//! Minimal Kafka producer.
//!
//! Only what publishing needs is implemented: Metadata v1 to find partition
//! leaders and Produce v3 with single-record v2 batches. Connections can be
//! bound to a source address, which general purpose clients don't offer.
//!
//! # Supported APIs
//!
//! | API | Key | Version | Request |
//! |-----|-----|---------|---------|
//! | Produce | 0 | 3 | [`ProduceRequest`] |
//! | Metadata | 3 | 1 | [`MetadataRequest`] |

mod connection;
mod metadata;
mod produce;
mod producer;
mod record_batch;

pub use connection::BrokerConnection;
pub use metadata::{BrokerMetadata, MetadataRequest, MetadataResponse, PartitionMetadata, TopicMetadata};
pub use produce::{ProducePartitionResponse, ProduceRequest, ProduceResponse, ProduceTopicResponse};
pub use producer::{KafkaProducer, ProducerSettings};
pub use record_batch::{Record, RecordBatch, crc32c};

use bytes::{Bytes, BytesMut};

use crate::error::Result;

/// A request this client can send.
///
/// The connection writes the request header; implementations only encode
/// the body and decode the response body that follows the correlation id.
pub trait KafkaRequest {
    type Response;

    /// The Kafka API key for this operation.
    fn api_key() -> i16;

    /// The API version the body is encoded with.
    fn api_version() -> i16;

    fn encode_body(&self, buffer: &mut BytesMut) -> Result<()>;

    fn decode_response(bytes: Bytes) -> Result<Self::Response>;
}
