//! Metadata API, version 1.

use bytes::{Bytes, BytesMut};
use nom::{
    IResult,
    number::complete::{be_i8, be_i16, be_i32},
};
use nombytes::NomBytes;

use super::KafkaRequest;
use crate::constants::{API_KEY_METADATA, METADATA_VERSION};
use crate::encode::{ToByte, encode_array};
use crate::error::{KafkaCode, Result};
use crate::parser::{
    bytes_to_string, parse_array, parse_nullable_string, parse_string, run_parser,
};

/// Ask for the brokers and the partitions of some topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub topics: Vec<String>,
}

impl MetadataRequest {
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    pub brokers: Vec<BrokerMetadata>,
    pub controller_id: i32,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMetadata {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
    pub rack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub error_code: KafkaCode,
    pub name: String,
    pub is_internal: bool,
    pub partitions: Vec<PartitionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub error_code: KafkaCode,
    pub partition_index: i32,
    /// -1 when the partition has no leader.
    pub leader_id: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
}

impl MetadataResponse {
    pub fn broker(&self, node_id: i32) -> Option<&BrokerMetadata> {
        self.brokers.iter().find(|b| b.node_id == node_id)
    }

    pub fn topic(&self, name: &str) -> Option<&TopicMetadata> {
        self.topics.iter().find(|t| t.name == name)
    }
}

impl TopicMetadata {
    /// Partitions that can be written to right now, in partition order.
    pub fn writable_partitions(&self) -> Vec<&PartitionMetadata> {
        let mut partitions: Vec<&PartitionMetadata> = self
            .partitions
            .iter()
            .filter(|p| p.leader_id >= 0 && p.error_code != KafkaCode::LeaderNotAvailable)
            .collect();
        partitions.sort_by_key(|p| p.partition_index);
        partitions
    }
}

impl KafkaRequest for MetadataRequest {
    type Response = MetadataResponse;

    fn api_key() -> i16 {
        API_KEY_METADATA
    }

    fn api_version() -> i16 {
        METADATA_VERSION
    }

    fn encode_body(&self, buffer: &mut BytesMut) -> Result<()> {
        encode_array(buffer, &self.topics)
    }

    fn decode_response(bytes: Bytes) -> Result<Self::Response> {
        let (_, response) = run_parser(&bytes, parse_metadata_response)?;
        Ok(response)
    }
}

fn parse_broker(s: NomBytes) -> IResult<NomBytes, BrokerMetadata> {
    let (s, node_id) = be_i32(s)?;
    let (s, host) = parse_string(s)?;
    let (s, port) = be_i32(s)?;
    let (s, rack) = parse_nullable_string(s)?;

    Ok((
        s,
        BrokerMetadata {
            node_id,
            host: bytes_to_string(&host)?,
            port,
            rack: rack.as_ref().map(bytes_to_string).transpose()?,
        },
    ))
}

fn parse_node_id(s: NomBytes) -> IResult<NomBytes, i32> {
    be_i32(s)
}

fn parse_partition(s: NomBytes) -> IResult<NomBytes, PartitionMetadata> {
    let (s, error_code) = be_i16(s)?;
    let (s, partition_index) = be_i32(s)?;
    let (s, leader_id) = be_i32(s)?;
    let (s, replica_nodes) = parse_array(parse_node_id)(s)?;
    let (s, isr_nodes) = parse_array(parse_node_id)(s)?;

    Ok((
        s,
        PartitionMetadata {
            error_code: KafkaCode::from_code(error_code),
            partition_index,
            leader_id,
            replica_nodes,
            isr_nodes,
        },
    ))
}

fn parse_topic(s: NomBytes) -> IResult<NomBytes, TopicMetadata> {
    let (s, error_code) = be_i16(s)?;
    let (s, name) = parse_string(s)?;
    let (s, is_internal) = be_i8(s)?;
    let (s, partitions) = parse_array(parse_partition)(s)?;

    Ok((
        s,
        TopicMetadata {
            error_code: KafkaCode::from_code(error_code),
            name: bytes_to_string(&name)?,
            is_internal: is_internal != 0,
            partitions,
        },
    ))
}

fn parse_metadata_response(s: NomBytes) -> IResult<NomBytes, MetadataResponse> {
    let (s, brokers) = parse_array(parse_broker)(s)?;
    let (s, controller_id) = be_i32(s)?;
    let (s, topics) = parse_array(parse_topic)(s)?;

    Ok((
        s,
        MetadataResponse {
            brokers,
            controller_id,
            topics,
        },
    ))
}

impl ToByte for MetadataResponse {
    fn encode<W: bytes::BufMut>(&self, buffer: &mut W) -> Result<()> {
        encode_array(buffer, &self.brokers)?;
        self.controller_id.encode(buffer)?;
        encode_array(buffer, &self.topics)
    }
}

impl ToByte for BrokerMetadata {
    fn encode<W: bytes::BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.node_id.encode(buffer)?;
        self.host.encode(buffer)?;
        self.port.encode(buffer)?;
        crate::encode::encode_nullable_string(buffer, self.rack.as_deref())
    }
}

impl ToByte for TopicMetadata {
    fn encode<W: bytes::BufMut>(&self, buffer: &mut W) -> Result<()> {
        (self.error_code as i16).encode(buffer)?;
        self.name.encode(buffer)?;
        self.is_internal.encode(buffer)?;
        encode_array(buffer, &self.partitions)
    }
}

impl ToByte for PartitionMetadata {
    fn encode<W: bytes::BufMut>(&self, buffer: &mut W) -> Result<()> {
        (self.error_code as i16).encode(buffer)?;
        self.partition_index.encode(buffer)?;
        self.leader_id.encode(buffer)?;
        encode_array(buffer, &self.replica_nodes)?;
        encode_array(buffer, &self.isr_nodes)
    }
}
