//! DHCPv6 message envelope.
//!
//! Only the structure the Kafka message format needs is decoded: the fixed
//! header of client/server and relay messages, and the option list. The
//! Relay Message option is decoded recursively so a relayed message can be
//! validated down to the client's message; every other option keeps its
//! raw data. Encoding a parsed message reproduces the original bytes.

mod options;

pub use options::Dhcpv6Option;

use std::fmt;
use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    IResult,
    bytes::complete::take,
    number::complete::{be_u8, be_u16},
};
use nombytes::NomBytes;

use crate::constants::{
    DHCPV6_CLIENT_SERVER_HEADER_SIZE, DHCPV6_RELAY_HEADER_SIZE, MAX_RELAY_DEPTH,
};
use crate::encode::ToByte;
use crate::error::{Error, Result};
use crate::parser::{parse_ipv6, parse_rest, parse_u16_bytes};

/// DHCPv6 Message Types (RFC 8415)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Solicit = 1,
    Advertise = 2,
    Request = 3,
    Confirm = 4,
    Renew = 5,
    Rebind = 6,
    Reply = 7,
    Release = 8,
    Decline = 9,
    Reconfigure = 10,
    InformationRequest = 11,
    RelayForw = 12,
    RelayRepl = 13,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Solicit),
            2 => Some(Self::Advertise),
            3 => Some(Self::Request),
            4 => Some(Self::Confirm),
            5 => Some(Self::Renew),
            6 => Some(Self::Rebind),
            7 => Some(Self::Reply),
            8 => Some(Self::Release),
            9 => Some(Self::Decline),
            10 => Some(Self::Reconfigure),
            11 => Some(Self::InformationRequest),
            12 => Some(Self::RelayForw),
            13 => Some(Self::RelayRepl),
            _ => None,
        }
    }

    pub fn is_relay(self) -> bool {
        matches!(self, Self::RelayForw | Self::RelayRepl)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Solicit => "solicit",
            Self::Advertise => "advertise",
            Self::Request => "request",
            Self::Confirm => "confirm",
            Self::Renew => "renew",
            Self::Rebind => "rebind",
            Self::Reply => "reply",
            Self::Release => "release",
            Self::Decline => "decline",
            Self::Reconfigure => "reconfigure",
            Self::InformationRequest => "information-request",
            Self::RelayForw => "relay-forward",
            Self::RelayRepl => "relay-reply",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A message exchanged between client and server (types 1 to 11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientServerMessage {
    pub message_type: MessageType,
    pub transaction_id: [u8; 3],
    pub options: Vec<Dhcpv6Option>,
}

/// A message exchanged between relay agents and the server (RELAY-FORW, RELAY-REPL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub message_type: MessageType,
    pub hop_count: u8,
    pub link_address: Ipv6Addr,
    pub peer_address: Ipv6Addr,
    pub options: Vec<Dhcpv6Option>,
}

/// A message of a type this crate doesn't know; the body is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessage {
    pub message_type: u8,
    pub data: Bytes,
}

/// A DHCPv6 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ClientServer(ClientServerMessage),
    Relay(RelayMessage),
    Unknown(UnknownMessage),
}

impl Message {
    /// Parse a message that fills the whole buffer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    /// Parse a message that fills the whole buffer, without copying it.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::MissingData("empty DHCPv6 message".to_string()));
        }
        let (_, message) =
            parse_message(NomBytes::new(data.clone()), 0).map_err(|_| Error::ParsingError(data))?;
        Ok(message)
    }

    /// The wire message type.
    pub fn message_type_code(&self) -> u8 {
        match self {
            Message::ClientServer(m) => m.message_type as u8,
            Message::Relay(m) => m.message_type as u8,
            Message::Unknown(m) => m.message_type,
        }
    }

    /// The message type, if it is one this crate knows.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.message_type_code())
    }

    pub fn options(&self) -> &[Dhcpv6Option] {
        match self {
            Message::ClientServer(m) => &m.options,
            Message::Relay(m) => &m.options,
            Message::Unknown(_) => &[],
        }
    }

    /// The first option with the given code.
    pub fn get_option(&self, code: u16) -> Option<&Dhcpv6Option> {
        self.options().iter().find(|o| o.code() == code)
    }

    /// The message carried by a relay message's Relay Message option.
    pub fn relayed_message(&self) -> Option<&Message> {
        match self {
            Message::Relay(m) => m.options.iter().find_map(Dhcpv6Option::relayed_message),
            _ => None,
        }
    }

    /// The client's message, found by descending through all relay layers.
    pub fn inner_message(&self) -> &Message {
        let mut message = self;
        while let Some(relayed) = message.relayed_message() {
            message = relayed;
        }
        message
    }

    /// Check that the message can be encoded.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> Result<()> {
        if depth > MAX_RELAY_DEPTH {
            return Err(Error::validation("Relay messages are nested too deep"));
        }
        let options = match self {
            Message::ClientServer(m) => {
                if m.message_type.is_relay() {
                    return Err(Error::validation(format!(
                        "A client/server message can't have type {}",
                        m.message_type
                    )));
                }
                &m.options
            }
            Message::Relay(m) => {
                if !m.message_type.is_relay() {
                    return Err(Error::validation(format!(
                        "A relay message can't have type {}",
                        m.message_type
                    )));
                }
                &m.options
            }
            Message::Unknown(m) => {
                if MessageType::from_u8(m.message_type).is_some() {
                    return Err(Error::validation(format!(
                        "Message type {} is known and can't be stored as unknown",
                        m.message_type
                    )));
                }
                return Ok(());
            }
        };
        for option in options {
            option.validate_at(depth)?;
        }
        Ok(())
    }

    /// Validate and encode the message.
    pub fn save(&self) -> Result<Bytes> {
        self.validate()?;
        let mut buffer = BytesMut::with_capacity(self.encoded_len_hint());
        self.encode(&mut buffer)?;
        Ok(buffer.freeze())
    }

    fn encoded_len_hint(&self) -> usize {
        let header = match self {
            Message::ClientServer(_) => DHCPV6_CLIENT_SERVER_HEADER_SIZE,
            Message::Relay(_) => DHCPV6_RELAY_HEADER_SIZE,
            Message::Unknown(m) => 1 + m.data.len(),
        };
        header + self.options().iter().map(Dhcpv6Option::encoded_len_hint).sum::<usize>()
    }
}

impl ToByte for Message {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        match self {
            Message::ClientServer(m) => {
                buffer.put_u8(m.message_type as u8);
                buffer.put_slice(&m.transaction_id);
                for option in &m.options {
                    option.encode(buffer)?;
                }
            }
            Message::Relay(m) => {
                buffer.put_u8(m.message_type as u8);
                buffer.put_u8(m.hop_count);
                m.link_address.encode(buffer)?;
                m.peer_address.encode(buffer)?;
                for option in &m.options {
                    option.encode(buffer)?;
                }
            }
            Message::Unknown(m) => {
                buffer.put_u8(m.message_type);
                buffer.put_slice(&m.data);
            }
        }
        Ok(())
    }
}

fn too_deep(s: NomBytes) -> nom::Err<nom::error::Error<NomBytes>> {
    nom::Err::Failure(nom::error::Error::new(s, nom::error::ErrorKind::TooLarge))
}

/// Parse a message that consumes the whole input.
pub(crate) fn parse_message(s: NomBytes, depth: usize) -> IResult<NomBytes, Message> {
    if depth > MAX_RELAY_DEPTH {
        return Err(too_deep(s));
    }

    let (s, message_type) = be_u8(s)?;
    match MessageType::from_u8(message_type) {
        Some(kind) if kind.is_relay() => {
            let (s, hop_count) = be_u8(s)?;
            let (s, link_address) = parse_ipv6(s)?;
            let (s, peer_address) = parse_ipv6(s)?;
            let (s, options) = parse_options(s, depth)?;
            Ok((
                s,
                Message::Relay(RelayMessage {
                    message_type: kind,
                    hop_count,
                    link_address,
                    peer_address,
                    options,
                }),
            ))
        }
        Some(kind) => {
            let (s, raw_id) = take(3usize)(s)?;
            let raw_id = raw_id.into_bytes();
            let transaction_id = [raw_id[0], raw_id[1], raw_id[2]];
            let (s, options) = parse_options(s, depth)?;
            Ok((
                s,
                Message::ClientServer(ClientServerMessage {
                    message_type: kind,
                    transaction_id,
                    options,
                }),
            ))
        }
        None => {
            let (s, data) = parse_rest(s)?;
            Ok((s, Message::Unknown(UnknownMessage { message_type, data })))
        }
    }
}

fn parse_options(mut s: NomBytes, depth: usize) -> IResult<NomBytes, Vec<Dhcpv6Option>> {
    let mut options = Vec::new();
    while !s.clone().into_bytes().is_empty() {
        let (rest, code) = be_u16(s)?;
        let (rest, data) = parse_u16_bytes(rest)?;
        options.push(options::decode_option(code, data, depth)?);
        s = rest;
    }
    Ok((s, options))
}
