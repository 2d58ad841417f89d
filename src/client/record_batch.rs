//! Kafka v2 record batches.
//!
//! # RecordBatch Header Layout
//!
//! ```text
//! Offset  Size  Field
//! 0       8     base_offset
//! 8       4     batch_length
//! 12      4     partition_leader_epoch
//! 16      1     magic (2)
//! 17      4     crc
//! 21      2     attributes
//! 23      4     last_offset_delta
//! 27      8     first_timestamp
//! 35      8     max_timestamp
//! 43      8     producer_id
//! 51      2     producer_epoch
//! 53      4     first_sequence
//! 57      4     records_count
//! ```
//!
//! The batch length counts everything after the length field. The CRC is a
//! CRC-32C over everything from the attributes to the end of the batch.

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    IResult,
    bytes::complete::take,
    multi::many_m_n,
    number::complete::{be_i8, be_i16, be_i32, be_i64, be_u32},
};
use nombytes::NomBytes;

use crate::constants::{
    BATCH_CRC_DATA_START, BATCH_CRC_OFFSET, BATCH_LENGTH_OFFSET, MAX_PROTOCOL_ARRAY_SIZE,
    MIN_BATCH_HEADER_SIZE, RECORD_BATCH_MAGIC,
};
use crate::encode::{ToByte, encode_varint};
use crate::error::{Error, KafkaCode, Result};
use crate::parser::{parse_varint, run_parser};

// CRC-32C polynomial used by Kafka (Castagnoli)
const CRC32C_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x82F63B78;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Compute a CRC-32C checksum (Castagnoli polynomial).
pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32C_TABLE[index];
    }
    !crc
}

/// One record of a batch. Headers are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp_delta: i64,
    pub offset_delta: i32,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

/// A v2 record batch as a producer without idempotence writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    pub base_offset: i64,
    /// Milliseconds since the UNIX epoch.
    pub first_timestamp: i64,
    pub records: Vec<Record>,
}

fn encode_nullable_varint_bytes(buffer: &mut BytesMut, data: Option<&Bytes>) {
    match data {
        Some(data) => {
            encode_varint(buffer, data.len() as i64);
            buffer.put_slice(data);
        }
        None => encode_varint(buffer, -1),
    }
}

impl Record {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut body = BytesMut::with_capacity(
            16 + self.key.as_ref().map_or(0, Bytes::len) + self.value.as_ref().map_or(0, Bytes::len),
        );
        body.put_i8(0); // attributes
        encode_varint(&mut body, self.timestamp_delta);
        encode_varint(&mut body, self.offset_delta as i64);
        encode_nullable_varint_bytes(&mut body, self.key.as_ref());
        encode_nullable_varint_bytes(&mut body, self.value.as_ref());
        encode_varint(&mut body, 0); // headers

        encode_varint(buffer, body.len() as i64);
        buffer.put_slice(&body);
    }
}

impl RecordBatch {
    /// A batch holding one record without a key.
    pub fn single(value: Bytes, timestamp_ms: i64) -> Self {
        Self {
            base_offset: 0,
            first_timestamp: timestamp_ms,
            records: vec![Record {
                timestamp_delta: 0,
                offset_delta: 0,
                key: None,
                value: Some(value),
            }],
        }
    }

    /// Encode the batch, filling in its length and CRC.
    pub fn encode(&self) -> Result<Bytes> {
        let last_offset_delta = self.records.iter().map(|r| r.offset_delta).max().unwrap_or(0);
        let max_timestamp = self.first_timestamp
            + self.records.iter().map(|r| r.timestamp_delta).max().unwrap_or(0);

        let mut buffer = BytesMut::with_capacity(MIN_BATCH_HEADER_SIZE + 64);
        self.base_offset.encode(&mut buffer)?;
        0i32.encode(&mut buffer)?; // batch_length, patched below
        (-1i32).encode(&mut buffer)?; // partition_leader_epoch
        RECORD_BATCH_MAGIC.encode(&mut buffer)?;
        0u32.encode(&mut buffer)?; // crc, patched below
        0i16.encode(&mut buffer)?; // attributes: no compression, create time
        last_offset_delta.encode(&mut buffer)?;
        self.first_timestamp.encode(&mut buffer)?;
        max_timestamp.encode(&mut buffer)?;
        (-1i64).encode(&mut buffer)?; // producer_id
        (-1i16).encode(&mut buffer)?; // producer_epoch
        (-1i32).encode(&mut buffer)?; // first_sequence
        (self.records.len() as i32).encode(&mut buffer)?;
        for record in &self.records {
            record.encode(&mut buffer);
        }

        let batch_length = (buffer.len() - BATCH_LENGTH_OFFSET - 4) as i32;
        buffer[BATCH_LENGTH_OFFSET..BATCH_LENGTH_OFFSET + 4]
            .copy_from_slice(&batch_length.to_be_bytes());
        let crc = crc32c(&buffer[BATCH_CRC_DATA_START..]);
        buffer[BATCH_CRC_OFFSET..BATCH_CRC_OFFSET + 4].copy_from_slice(&crc.to_be_bytes());

        Ok(buffer.freeze())
    }

    /// Decode a batch, checking the magic byte and the CRC.
    pub fn decode(data: &Bytes) -> Result<Self> {
        if data.len() < MIN_BATCH_HEADER_SIZE {
            return Err(Error::MissingData(format!(
                "record batch of {} bytes is shorter than its header",
                data.len()
            )));
        }
        if data[16] as i8 != RECORD_BATCH_MAGIC {
            return Err(Error::Kafka(KafkaCode::UnsupportedForMessageFormat));
        }

        let stored_crc = u32::from_be_bytes([
            data[BATCH_CRC_OFFSET],
            data[BATCH_CRC_OFFSET + 1],
            data[BATCH_CRC_OFFSET + 2],
            data[BATCH_CRC_OFFSET + 3],
        ]);
        if stored_crc != crc32c(&data[BATCH_CRC_DATA_START..]) {
            return Err(Error::Kafka(KafkaCode::CorruptMessage));
        }

        let (_, batch) = run_parser(data, parse_record_batch)?;
        Ok(batch)
    }
}

fn parse_nullable_varint_bytes(s: NomBytes) -> IResult<NomBytes, Option<Bytes>> {
    let (s, length) = parse_varint(s)?;
    if length < 0 {
        return Ok((s, None));
    }
    let (s, data) = take(length as usize)(s)?;
    Ok((s, Some(data.into_bytes())))
}

fn parse_header(s: NomBytes) -> IResult<NomBytes, ()> {
    let (s, _key) = parse_nullable_varint_bytes(s)?;
    let (s, _value) = parse_nullable_varint_bytes(s)?;
    Ok((s, ()))
}

fn parse_record(s: NomBytes) -> IResult<NomBytes, Record> {
    let (s, length) = parse_varint(s)?;
    let (s, body) = take(length.max(0) as usize)(s)?;

    let (b, _attributes) = be_i8(body)?;
    let (b, timestamp_delta) = parse_varint(b)?;
    let (b, offset_delta) = parse_varint(b)?;
    let (b, key) = parse_nullable_varint_bytes(b)?;
    let (b, value) = parse_nullable_varint_bytes(b)?;
    let (b, header_count) = parse_varint(b)?;
    let header_count = header_count.clamp(0, MAX_PROTOCOL_ARRAY_SIZE as i64) as usize;
    let (_, _headers) = many_m_n(header_count, header_count, parse_header)(b)?;

    Ok((
        s,
        Record {
            timestamp_delta,
            offset_delta: offset_delta as i32,
            key,
            value,
        },
    ))
}

fn parse_record_batch(s: NomBytes) -> IResult<NomBytes, RecordBatch> {
    let (s, base_offset) = be_i64(s)?;
    let (s, _batch_length) = be_i32(s)?;
    let (s, _leader_epoch) = be_i32(s)?;
    let (s, _magic) = be_i8(s)?;
    let (s, _crc) = be_u32(s)?;
    let (s, _attributes) = be_i16(s)?;
    let (s, _last_offset_delta) = be_i32(s)?;
    let (s, first_timestamp) = be_i64(s)?;
    let (s, _max_timestamp) = be_i64(s)?;
    let (s, _producer_id) = be_i64(s)?;
    let (s, _producer_epoch) = be_i16(s)?;
    let (s, _first_sequence) = be_i32(s)?;
    let (s, count) = be_i32(s)?;
    if !(0..=MAX_PROTOCOL_ARRAY_SIZE).contains(&count) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            s,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    let (s, records) = many_m_n(count as usize, count as usize, parse_record)(s)?;

    Ok((
        s,
        RecordBatch {
            base_offset,
            first_timestamp,
            records,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn test_single_record_header() {
        let batch = RecordBatch::single(Bytes::from_static(b"payload"), 1_500_000_000_000)
            .encode()
            .unwrap();

        assert_eq!(&batch[0..8], &0i64.to_be_bytes());
        let batch_length = i32::from_be_bytes(batch[8..12].try_into().unwrap());
        assert_eq!(batch_length as usize, batch.len() - 12);
        assert_eq!(&batch[12..16], &(-1i32).to_be_bytes());
        assert_eq!(batch[16], 2);
        assert_eq!(&batch[23..27], &0i32.to_be_bytes());
        assert_eq!(&batch[27..35], &1_500_000_000_000i64.to_be_bytes());
        assert_eq!(&batch[35..43], &1_500_000_000_000i64.to_be_bytes());
        assert_eq!(&batch[43..51], &(-1i64).to_be_bytes());
        assert_eq!(&batch[57..61], &1i32.to_be_bytes());

        let crc = u32::from_be_bytes(batch[17..21].try_into().unwrap());
        assert_eq!(crc, crc32c(&batch[21..]));
    }

    #[test]
    fn test_single_record_body() {
        let batch = RecordBatch::single(Bytes::from_static(b"abc"), 0).encode().unwrap();
        // length 9, attributes, ts delta 0, offset delta 0, key -1, value length 3, "abc", 0 headers
        assert_eq!(
            &batch[61..],
            &[0x12, 0x00, 0x00, 0x00, 0x01, 0x06, b'a', b'b', b'c', 0x00]
        );
    }

    #[test]
    fn test_decode_encoded_batch() {
        let original = RecordBatch::single(Bytes::from_static(b"payload"), 42);
        let decoded = RecordBatch::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_detects_corruption() {
        let mut data = RecordBatch::single(Bytes::from_static(b"payload"), 42)
            .encode()
            .unwrap()
            .to_vec();
        let last = data.len() - 2;
        data[last] ^= 0xff;

        assert_eq!(
            RecordBatch::decode(&Bytes::from(data)),
            Err(Error::Kafka(KafkaCode::CorruptMessage))
        );
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            RecordBatch::decode(&Bytes::from_static(&[0u8; 20])),
            Err(Error::MissingData(_))
        ));
    }
}
