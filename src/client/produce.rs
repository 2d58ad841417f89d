//! Produce API, version 3.

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    IResult,
    number::complete::{be_i16, be_i32, be_i64},
};
use nombytes::NomBytes;

use super::KafkaRequest;
use crate::constants::{API_KEY_PRODUCE, PRODUCE_VERSION};
use crate::encode::{ToByte, encode_as_array, encode_nullable_string};
use crate::error::{KafkaCode, Result};
use crate::parser::{bytes_to_string, parse_array, parse_string, run_parser};

/// Write one record batch to one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    pub acks: i16,
    pub timeout_ms: i32,
    pub topic: String,
    pub partition: i32,
    /// An encoded [`RecordBatch`](super::RecordBatch).
    pub records: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponse {
    pub responses: Vec<ProduceTopicResponse>,
    pub throttle_time_ms: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceTopicResponse {
    pub name: String,
    pub partitions: Vec<ProducePartitionResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducePartitionResponse {
    pub partition_index: i32,
    pub error_code: KafkaCode,
    pub base_offset: i64,
    pub log_append_time: i64,
}

impl ProduceResponse {
    /// The outcome for one partition, if the broker reported it.
    pub fn partition(&self, topic: &str, partition: i32) -> Option<&ProducePartitionResponse> {
        self.responses
            .iter()
            .filter(|t| t.name == topic)
            .flat_map(|t| t.partitions.iter())
            .find(|p| p.partition_index == partition)
    }
}

impl KafkaRequest for ProduceRequest {
    type Response = ProduceResponse;

    fn api_key() -> i16 {
        API_KEY_PRODUCE
    }

    fn api_version() -> i16 {
        PRODUCE_VERSION
    }

    fn encode_body(&self, buffer: &mut BytesMut) -> Result<()> {
        encode_nullable_string(buffer, None)?; // transactional_id
        self.acks.encode(buffer)?;
        self.timeout_ms.encode(buffer)?;
        encode_as_array(buffer, &[self], |buffer, request| {
            request.topic.encode(buffer)?;
            encode_as_array(buffer, &[request], |buffer, request| {
                request.partition.encode(buffer)?;
                request.records[..].encode(buffer)
            })
        })
    }

    fn decode_response(bytes: Bytes) -> Result<Self::Response> {
        let (_, response) = run_parser(&bytes, parse_produce_response)?;
        Ok(response)
    }
}

fn parse_partition_response(s: NomBytes) -> IResult<NomBytes, ProducePartitionResponse> {
    let (s, partition_index) = be_i32(s)?;
    let (s, error_code) = be_i16(s)?;
    let (s, base_offset) = be_i64(s)?;
    let (s, log_append_time) = be_i64(s)?;

    Ok((
        s,
        ProducePartitionResponse {
            partition_index,
            error_code: KafkaCode::from_code(error_code),
            base_offset,
            log_append_time,
        },
    ))
}

fn parse_topic_response(s: NomBytes) -> IResult<NomBytes, ProduceTopicResponse> {
    let (s, name) = parse_string(s)?;
    let (s, partitions) = parse_array(parse_partition_response)(s)?;

    Ok((
        s,
        ProduceTopicResponse {
            name: bytes_to_string(&name)?,
            partitions,
        },
    ))
}

fn parse_produce_response(s: NomBytes) -> IResult<NomBytes, ProduceResponse> {
    let (s, responses) = parse_array(parse_topic_response)(s)?;
    let (s, throttle_time_ms) = be_i32(s)?;

    Ok((
        s,
        ProduceResponse {
            responses,
            throttle_time_ms,
        },
    ))
}

impl ToByte for ProduceResponse {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        encode_as_array(buffer, &self.responses, |buffer, topic| {
            topic.name.encode(buffer)?;
            encode_as_array(buffer, &topic.partitions, |buffer, partition| {
                partition.partition_index.encode(buffer)?;
                (partition.error_code as i16).encode(buffer)?;
                partition.base_offset.encode(buffer)?;
                partition.log_append_time.encode(buffer)
            })
        })?;
        self.throttle_time_ms.encode(buffer)
    }
}
