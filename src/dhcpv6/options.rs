//! DHCPv6 options.

use bytes::{BufMut, Bytes, BytesMut};
use nom::IResult;
use nombytes::NomBytes;

use super::{Message, parse_message};
use crate::constants::{DHCPV6_OPTION_HEADER_SIZE, OPTION_RELAY_MSG};
use crate::encode::ToByte;
use crate::error::{Error, Result};

/// A DHCPv6 option.
///
/// The Relay Message option is decoded into the message it carries; all
/// other options are kept as raw data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dhcpv6Option {
    RelayMessage(Box<Message>),
    Other { code: u16, data: Bytes },
}

impl Dhcpv6Option {
    pub fn new(code: u16, data: Bytes) -> Self {
        Dhcpv6Option::Other { code, data }
    }

    pub fn relay_message(message: Message) -> Self {
        Dhcpv6Option::RelayMessage(Box::new(message))
    }

    pub fn code(&self) -> u16 {
        match self {
            Dhcpv6Option::RelayMessage(_) => OPTION_RELAY_MSG,
            Dhcpv6Option::Other { code, .. } => *code,
        }
    }

    pub fn relayed_message(&self) -> Option<&Message> {
        match self {
            Dhcpv6Option::RelayMessage(message) => Some(message),
            Dhcpv6Option::Other { .. } => None,
        }
    }

    pub(super) fn validate_at(&self, depth: usize) -> Result<()> {
        match self {
            Dhcpv6Option::RelayMessage(message) => message.validate_at(depth + 1),
            Dhcpv6Option::Other { code, data } => {
                if *code == OPTION_RELAY_MSG {
                    return Err(Error::validation(
                        "Relay Message options must carry a decoded message",
                    ));
                }
                if data.len() > u16::MAX as usize {
                    return Err(Error::validation(format!(
                        "Option {} data must be 65535 bytes or less",
                        code
                    )));
                }
                Ok(())
            }
        }
    }

    pub(super) fn encoded_len_hint(&self) -> usize {
        DHCPV6_OPTION_HEADER_SIZE
            + match self {
                Dhcpv6Option::RelayMessage(message) => message.encoded_len_hint(),
                Dhcpv6Option::Other { data, .. } => data.len(),
            }
    }
}

impl ToByte for Dhcpv6Option {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        match self {
            Dhcpv6Option::RelayMessage(message) => {
                let mut inner = BytesMut::with_capacity(message.encoded_len_hint());
                message.encode(&mut inner)?;
                if inner.len() > u16::MAX as usize {
                    return Err(Error::validation(
                        "Relayed message must be 65535 bytes or less",
                    ));
                }
                buffer.put_u16(OPTION_RELAY_MSG);
                buffer.put_u16(inner.len() as u16);
                buffer.put_slice(&inner);
            }
            Dhcpv6Option::Other { code, data } => {
                buffer.put_u16(*code);
                buffer.put_u16(data.len() as u16);
                buffer.put_slice(data);
            }
        }
        Ok(())
    }
}

/// Turn a raw option into a [`Dhcpv6Option`], decoding relayed messages.
pub(super) fn decode_option(
    code: u16,
    data: Bytes,
    depth: usize,
) -> std::result::Result<Dhcpv6Option, nom::Err<nom::error::Error<NomBytes>>> {
    if code != OPTION_RELAY_MSG {
        return Ok(Dhcpv6Option::Other { code, data });
    }
    if data.is_empty() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            NomBytes::new(data),
            nom::error::ErrorKind::Eof,
        )));
    }
    let parsed: IResult<NomBytes, Message> = parse_message(NomBytes::new(data), depth + 1);
    let (_, message) = parsed?;
    Ok(Dhcpv6Option::RelayMessage(Box::new(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_raw_option() {
        let option = Dhcpv6Option::new(18, Bytes::from_static(b"Fa2/3"));
        let mut buf = BytesMut::new();
        option.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], b"\x00\x12\x00\x05Fa2/3");
        assert_eq!(option.code(), 18);
        assert!(option.relayed_message().is_none());
    }

    #[test]
    fn test_raw_relay_message_option_is_invalid() {
        let option = Dhcpv6Option::new(OPTION_RELAY_MSG, Bytes::from_static(b"\x01abc"));
        assert!(option.validate_at(0).is_err());
    }

    #[test]
    fn test_empty_relay_message_option_is_rejected() {
        assert!(decode_option(OPTION_RELAY_MSG, Bytes::new(), 0).is_err());
    }
}
