//! Deserialize data from the big-endian wire formats.
use std::net::Ipv6Addr;

use bytes::Bytes;
use nom::{
    IResult,
    bytes::complete::take,
    multi::many_m_n,
    number::complete::{be_i16, be_i32, be_u8, be_u16},
};
use nombytes::NomBytes;

use crate::constants::MAX_PROTOCOL_ARRAY_SIZE;
use crate::error::Error;

/// Convert bytes to a validated UTF-8 string.
/// Returns an error if the bytes are not valid UTF-8.
pub fn bytes_to_string(bytes: &Bytes) -> Result<String, nom::Err<nom::error::Error<NomBytes>>> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| {
            nom::Err::Failure(nom::error::Error::new(
                NomBytes::from(bytes.as_ref()),
                nom::error::ErrorKind::Verify,
            ))
        })
}

/// Run a parser over a complete buffer and map any failure to [`Error::ParsingError`].
///
/// Returns the parsed value and the unconsumed tail.
pub fn run_parser<O, F>(data: &Bytes, mut parser: F) -> crate::error::Result<(Bytes, O)>
where
    F: FnMut(NomBytes) -> IResult<NomBytes, O>,
{
    let (remaining, value) =
        parser(NomBytes::new(data.clone())).map_err(|_| Error::ParsingError(data.clone()))?;
    Ok((remaining.into_bytes(), value))
}

/// Kafka STRING: i16 length followed by UTF-8 bytes.
pub fn parse_string(s: NomBytes) -> IResult<NomBytes, Bytes> {
    let (s, length) = be_u16(s)?;
    let (s, string) = take(length)(s)?;
    Ok((s, string.into_bytes()))
}

pub fn parse_nullable_string(s: NomBytes) -> IResult<NomBytes, Option<Bytes>> {
    let (s, length) = be_i16(s)?;

    // Null string
    if length == -1 {
        return Ok((s, None));
    }

    if length < 0 {
        return Err(nom::Err::Failure(nom::error::Error::new(
            s,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (s, string) = take(length as u16)(s)?;
    Ok((s, Some(string.into_bytes())))
}

pub fn parse_array<O, E, F>(f: F) -> impl FnMut(NomBytes) -> IResult<NomBytes, Vec<O>, E>
where
    F: nom::Parser<NomBytes, O, E> + Copy,
    E: nom::error::ParseError<NomBytes>,
{
    move |input: NomBytes| {
        let i = input.clone();
        let (i, length) = be_i32(i)?;

        // Null array
        if length == -1 {
            return Ok((i, vec![]));
        }

        if !(0..=MAX_PROTOCOL_ARRAY_SIZE).contains(&length) {
            return Err(nom::Err::Failure(E::from_error_kind(
                i,
                nom::error::ErrorKind::TooLarge,
            )));
        }

        many_m_n(length as usize, length as usize, f)(i)
    }
}

/// A byte string prefixed with a one byte length.
pub fn parse_short_bytes(s: NomBytes) -> IResult<NomBytes, Bytes> {
    let (s, length) = be_u8(s)?;
    let (s, data) = take(length)(s)?;
    Ok((s, data.into_bytes()))
}

/// A byte string prefixed with a two byte length.
pub fn parse_u16_bytes(s: NomBytes) -> IResult<NomBytes, Bytes> {
    let (s, length) = be_u16(s)?;
    let (s, data) = take(length)(s)?;
    Ok((s, data.into_bytes()))
}

pub fn parse_ipv6(s: NomBytes) -> IResult<NomBytes, Ipv6Addr> {
    let (s, raw) = take(16usize)(s)?;
    let raw = raw.into_bytes();
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&raw);
    Ok((s, Ipv6Addr::from(octets)))
}

/// Everything that is left of the input.
pub fn parse_rest(s: NomBytes) -> IResult<NomBytes, Bytes> {
    let rest = s.into_bytes();
    Ok((NomBytes::new(Bytes::new()), rest))
}

/// Unsigned LEB128 varint of at most ten bytes.
pub fn parse_unsigned_varint(s: NomBytes) -> IResult<NomBytes, u64> {
    let mut input = s;
    let mut value = 0u64;
    for i in 0..10 {
        let (rest, byte) = be_u8(input)?;
        input = rest;
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((input, value));
        }
    }
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::TooLarge,
    )))
}

/// Zigzag encoded signed varint, as used inside v2 records.
pub fn parse_varint(s: NomBytes) -> IResult<NomBytes, i64> {
    let (s, raw) = parse_unsigned_varint(s)?;
    Ok((s, ((raw >> 1) as i64) ^ -((raw & 1) as i64)))
}
