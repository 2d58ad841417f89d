//! The Kafka message that carries one DHCPv6 transaction.
//!
//! ```text
//! Offset  Size     Field
//! 0       1        message type (1)
//! 1       1        server name length (n)
//! 2       n        server name, UTF-8
//! 2+n     8        timestamp in, f64 seconds since the epoch
//! 10+n    2        incoming message length (i, 0 = none)
//! 12+n    i        incoming DHCPv6 message
//! 12+n+i  8        timestamp out
//! 20+n+i  2        outgoing message length (o, 0 = none)
//! 22+n+i  o        outgoing DHCPv6 message
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    IResult,
    number::complete::{be_f64, be_u8},
};
use nombytes::NomBytes;

use crate::constants::{DHCP_MESSAGE, MAX_EMBEDDED_MESSAGE_LENGTH, MAX_SERVER_NAME_LENGTH};
use crate::dhcpv6::Message;
use crate::encode::ToByte;
use crate::error::{Error, Result};
use crate::parser::{bytes_to_string, parse_short_bytes, parse_u16_bytes, run_parser};

/// A message for publishing DHCPv6 transactions over Kafka for analysis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DhcpKafkaMessage {
    pub server_name: String,
    pub timestamp_in: f64,
    pub message_in: Option<Message>,
    pub timestamp_out: f64,
    pub message_out: Option<Message>,
}

struct RawDhcpKafkaMessage {
    message_type: u8,
    server_name: String,
    timestamp_in: f64,
    message_in: Bytes,
    timestamp_out: f64,
    message_out: Bytes,
}

fn parse_raw(s: NomBytes) -> IResult<NomBytes, RawDhcpKafkaMessage> {
    let (s, message_type) = be_u8(s)?;
    let (s, server_name) = parse_short_bytes(s)?;
    let (s, timestamp_in) = be_f64(s)?;
    let (s, message_in) = parse_u16_bytes(s)?;
    let (s, timestamp_out) = be_f64(s)?;
    let (s, message_out) = parse_u16_bytes(s)?;

    Ok((
        s,
        RawDhcpKafkaMessage {
            message_type,
            server_name: bytes_to_string(&server_name)?,
            timestamp_in,
            message_in,
            timestamp_out,
            message_out,
        },
    ))
}

fn load_embedded(data: Bytes) -> Result<Option<Message>> {
    if data.is_empty() {
        Ok(None)
    } else {
        Message::from_bytes(data).map(Some)
    }
}

impl DhcpKafkaMessage {
    pub const MESSAGE_TYPE: u8 = DHCP_MESSAGE;

    /// Start a message for a transaction that has just been received.
    pub fn new(server_name: impl Into<String>, timestamp_in: f64, message_in: Message) -> Self {
        Self {
            server_name: server_name.into(),
            timestamp_in,
            message_in: Some(message_in),
            ..Default::default()
        }
    }

    /// Decode a message from the start of `buffer`.
    ///
    /// Returns the number of bytes used; anything after the message is ignored.
    pub fn load_from(buffer: &[u8]) -> Result<(usize, Self)> {
        match buffer.first() {
            None => return Err(Error::MissingData("Kafka message type".to_string())),
            Some(&message_type) if message_type != Self::MESSAGE_TYPE => {
                return Err(Error::validation(
                    "The provided buffer does not contain DhcpKafkaMessage data",
                ));
            }
            Some(_) => {}
        }

        let data = Bytes::copy_from_slice(buffer);
        let (remaining, raw) = run_parser(&data, parse_raw)?;
        debug_assert_eq!(raw.message_type, Self::MESSAGE_TYPE);

        let message = Self {
            server_name: raw.server_name,
            timestamp_in: raw.timestamp_in,
            message_in: load_embedded(raw.message_in)?,
            timestamp_out: raw.timestamp_out,
            message_out: load_embedded(raw.message_out)?,
        };
        message.validate()?;

        Ok((buffer.len() - remaining.len(), message))
    }

    /// Validate that the contents of this object conform to the message format.
    pub fn validate(&self) -> Result<()> {
        if self.server_name.len() > MAX_SERVER_NAME_LENGTH {
            return Err(Error::validation(
                "The server name encoded as UTF-8 must be 255 bytes or less",
            ));
        }

        if !self.timestamp_in.is_finite() || !self.timestamp_out.is_finite() {
            return Err(Error::validation("Timestamps must be finite numbers"));
        }

        if let Some(message) = &self.message_in {
            message.validate().map_err(|e| {
                Error::validation(format!(
                    "The incoming message is not a valid DHCPv6 message: {}",
                    e
                ))
            })?;
        }

        if let Some(message) = &self.message_out {
            message.validate().map_err(|e| {
                Error::validation(format!(
                    "The outgoing message is not a valid DHCPv6 message: {}",
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Validate and encode the message.
    pub fn save(&self) -> Result<Bytes> {
        self.validate()?;

        let message_in = encode_embedded(self.message_in.as_ref(), "incoming")?;
        let message_out = encode_embedded(self.message_out.as_ref(), "outgoing")?;

        let mut buffer = BytesMut::with_capacity(
            22 + self.server_name.len() + message_in.len() + message_out.len(),
        );
        buffer.put_u8(Self::MESSAGE_TYPE);
        buffer.put_u8(self.server_name.len() as u8);
        buffer.put_slice(self.server_name.as_bytes());
        self.timestamp_in.encode(&mut buffer)?;
        (message_in.len() as u16).encode(&mut buffer)?;
        buffer.put_slice(&message_in);
        self.timestamp_out.encode(&mut buffer)?;
        (message_out.len() as u16).encode(&mut buffer)?;
        buffer.put_slice(&message_out);

        Ok(buffer.freeze())
    }
}

fn encode_embedded(message: Option<&Message>, direction: &str) -> Result<Bytes> {
    let Some(message) = message else {
        return Ok(Bytes::new());
    };
    let encoded = message.save()?;
    if encoded.len() > MAX_EMBEDDED_MESSAGE_LENGTH {
        return Err(Error::validation(format!(
            "The {} message must be {} bytes or less when encoded",
            direction, MAX_EMBEDDED_MESSAGE_LENGTH
        )));
    }
    Ok(encoded)
}
