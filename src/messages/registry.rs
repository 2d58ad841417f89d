//! Registry of Kafka message decoders.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{DhcpKafkaMessage, KafkaMessage, UnknownKafkaMessage};
use crate::error::{Error, Result};

/// Decodes a message of one type from the start of a buffer.
pub type LoadFn = fn(&[u8]) -> Result<(usize, KafkaMessage)>;

/// One registered message type.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub message_type: u8,
    /// Short name, e.g. `dhcp` for `DhcpKafkaMessage`.
    pub name: String,
    pub load: LoadFn,
}

/// Maps message type bytes and names to decoders.
#[derive(Debug, Clone, Default)]
pub struct KafkaMessageRegistry {
    by_type: HashMap<u8, RegistryEntry>,
    by_name: HashMap<String, u8>,
}

fn load_dhcp(buffer: &[u8]) -> Result<(usize, KafkaMessage)> {
    DhcpKafkaMessage::load_from(buffer).map(|(length, m)| (length, KafkaMessage::Dhcp(m)))
}

/// Convert a type name like `DhcpKafkaMessage` into `dhcp-kafka-message`.
fn dashed_name(type_name: &str) -> String {
    let chars: Vec<char> = type_name.chars().collect();
    let mut name = String::with_capacity(type_name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev_lower = chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev_lower || (chars[i - 1].is_ascii_uppercase() && next_lower) {
                name.push('-');
            }
        }
        name.push(c.to_ascii_lowercase());
    }
    name
}

/// The registry name of a message type name.
pub(crate) fn registry_name(type_name: &str) -> String {
    let name = dashed_name(type_name);
    match name.strip_suffix("-kafka-message") {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

impl KafkaMessageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every message type this crate implements.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(DhcpKafkaMessage::MESSAGE_TYPE, "DhcpKafkaMessage", load_dhcp);
        registry
    }

    /// Register a decoder. Type bytes and names must be unique.
    pub fn register(&mut self, message_type: u8, type_name: &str, load: LoadFn) -> Result<()> {
        let name = registry_name(type_name);
        if self.by_type.contains_key(&message_type) {
            return Err(Error::Config(format!(
                "Kafka message type {} is already registered",
                message_type
            )));
        }
        if self.by_name.contains_key(&name) {
            return Err(Error::Config(format!(
                "Kafka message name '{}' is already registered",
                name
            )));
        }

        self.insert(message_type, type_name, load);
        Ok(())
    }

    fn insert(&mut self, message_type: u8, type_name: &str, load: LoadFn) {
        let name = registry_name(type_name);
        tracing::debug!(message_type, name = %name, "Registered Kafka message type");
        self.by_name.insert(name.clone(), message_type);
        self.by_type.insert(
            message_type,
            RegistryEntry {
                message_type,
                name,
                load,
            },
        );
    }

    pub fn get(&self, message_type: u8) -> Option<&RegistryEntry> {
        self.by_type.get(&message_type)
    }

    pub fn by_name(&self, name: &str) -> Option<&RegistryEntry> {
        self.by_name.get(name).and_then(|t| self.by_type.get(t))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode a message with the registered decoder for its type, or as an
    /// [`UnknownKafkaMessage`] when there is none.
    pub fn parse(&self, buffer: &[u8]) -> Result<(usize, KafkaMessage)> {
        let message_type = *buffer
            .first()
            .ok_or_else(|| Error::MissingData("Kafka message type".to_string()))?;

        match self.get(message_type) {
            Some(entry) => (entry.load)(buffer),
            None => UnknownKafkaMessage::load_from(buffer)
                .map(|(length, m)| (length, KafkaMessage::Unknown(m))),
        }
    }
}

static REGISTRY: Lazy<KafkaMessageRegistry> = Lazy::new(KafkaMessageRegistry::with_builtin);

/// The process-wide registry used by [`KafkaMessage::parse`].
pub fn kafka_message_registry() -> &'static KafkaMessageRegistry {
    &REGISTRY
}
