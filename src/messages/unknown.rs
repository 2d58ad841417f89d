//! Container for Kafka messages of a type nobody registered.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Raw message content for cases where we don't know how to decode the message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnknownKafkaMessage {
    pub message_type: u8,
    pub message_data: Bytes,
}

impl UnknownKafkaMessage {
    pub fn new(message_type: u8, message_data: Bytes) -> Self {
        Self {
            message_type,
            message_data,
        }
    }

    /// Decode a message; all data after the type byte belongs to it.
    pub fn load_from(buffer: &[u8]) -> Result<(usize, Self)> {
        let (&message_type, data) = buffer
            .split_first()
            .ok_or_else(|| Error::MissingData("Kafka message type".to_string()))?;

        let message = Self::new(message_type, Bytes::copy_from_slice(data));
        message.validate()?;
        Ok((buffer.len(), message))
    }

    /// The message type is a single byte and the data is opaque, so every
    /// value is valid.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    pub fn save(&self) -> Result<Bytes> {
        self.validate()?;

        let mut buffer = BytesMut::with_capacity(1 + self.message_data.len());
        buffer.put_u8(self.message_type);
        buffer.put_slice(&self.message_data);
        Ok(buffer.freeze())
    }
}
