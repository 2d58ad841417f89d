//! Serialize data into the big-endian wire formats.
use std::net::Ipv6Addr;

use bytes::BufMut;

use crate::error::Result;

pub trait ToByte {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()>;
}

impl<'a, T: ToByte + 'a + ?Sized> ToByte for &'a T {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        (*self).encode(buffer)
    }
}

impl ToByte for bool {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i8(*self as i8);
        Ok(())
    }
}

impl ToByte for i8 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i8(*self);
        Ok(())
    }
}

impl ToByte for i16 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i16(*self);
        Ok(())
    }
}

impl ToByte for u16 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_u16(*self);
        Ok(())
    }
}

impl ToByte for i32 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i32(*self);
        Ok(())
    }
}

impl ToByte for u32 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_u32(*self);
        Ok(())
    }
}

impl ToByte for i64 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i64(*self);
        Ok(())
    }
}

impl ToByte for f64 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_f64(*self);
        Ok(())
    }
}

impl ToByte for Ipv6Addr {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_slice(&self.octets());
        Ok(())
    }
}

/// Kafka STRING: i16 length followed by the UTF-8 bytes.
impl ToByte for str {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i16(self.len() as i16);
        buffer.put(self.as_bytes());
        Ok(())
    }
}

impl ToByte for String {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.as_str().encode(buffer)
    }
}

/// Kafka BYTES: i32 length followed by the data.
impl ToByte for [u8] {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i32(self.len() as i32);
        buffer.put(self);
        Ok(())
    }
}

/// Encode a Kafka NULLABLE_STRING; `None` is written as length -1.
pub fn encode_nullable_string<W: BufMut>(buffer: &mut W, value: Option<&str>) -> Result<()> {
    match value {
        Some(s) => s.encode(buffer),
        None => {
            buffer.put_i16(-1);
            Ok(())
        }
    }
}

/// Renders the length of `xs` to `buffer` as the start of a
/// protocol array and then for each element of `xs` invokes `f`
/// assuming that function will render the element to the buffer.
pub fn encode_as_array<T, F, W>(buffer: &mut W, xs: &[T], mut f: F) -> Result<()>
where
    F: FnMut(&mut W, &T) -> Result<()>,
    W: BufMut,
{
    buffer.put_i32(xs.len() as i32);
    for x in xs {
        f(buffer, x)?;
    }
    Ok(())
}

/// Encode a slice of ToByte items as a Kafka protocol array.
pub fn encode_array<T: ToByte, W: BufMut>(buffer: &mut W, items: &[T]) -> Result<()> {
    encode_as_array(buffer, items, |buffer, item| item.encode(buffer))
}

/// Encode an unsigned varint (variable-length integer) to the buffer.
pub fn encode_unsigned_varint<W: BufMut>(buffer: &mut W, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buffer.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Encode a zigzag signed varint, as used inside v2 records.
pub fn encode_varint<W: BufMut>(buffer: &mut W, value: i64) {
    encode_unsigned_varint(buffer, ((value << 1) ^ (value >> 63)) as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_encode_string() {
        let mut buf = BytesMut::new();
        "topic".encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 5, b't', b'o', b'p', b'i', b'c']);
    }

    #[test]
    fn test_encode_nullable_string_none() {
        let mut buf = BytesMut::new();
        encode_nullable_string(&mut buf, None).unwrap();
        assert_eq!(&buf[..], &[0xff, 0xff]);
    }

    #[test]
    fn test_encode_bytes() {
        let mut buf = BytesMut::new();
        b"abc"[..].encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_encode_f64() {
        let mut buf = BytesMut::new();
        12345.0f64.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x40, 0xc8, 0x1c, 0x80, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_array_of_strings() {
        let mut buf = BytesMut::new();
        encode_array(&mut buf, &["a", "bc"]).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 2, 0, 1, b'a', 0, 2, b'b', b'c']);
    }

    #[test]
    fn test_encode_varint_zigzag() {
        let cases: &[(i64, &[u8])] = &[
            (0, &[0x00]),
            (-1, &[0x01]),
            (1, &[0x02]),
            (-2, &[0x03]),
            (63, &[0x7e]),
            (64, &[0x80, 0x01]),
            (300, &[0xd8, 0x04]),
        ];
        for (value, expected) in cases {
            let mut buf = BytesMut::new();
            encode_varint(&mut buf, *value);
            assert_eq!(&buf[..], *expected, "value {}", value);
        }
    }
}
