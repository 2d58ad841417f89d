//! # dhcpkit-kafka
//! A DHCPv6 server handler that publishes every transaction to Kafka.
//!
//! For each transaction the handler records the incoming request and when it
//! arrived, then the outgoing response and when it left, and publishes both
//! as one binary [`DhcpKafkaMessage`](messages::DhcpKafkaMessage). Consumers
//! can use the topic as a looking glass into the server.
//!
//! The handler is configured with a `send-to-kafka` section:
//!
//! ```text
//! <send-to-kafka>
//!     server-name dhcp1.example.com
//!     topic dhcpkit.messages
//!     broker kafka1.example.com:9092
//!     broker kafka2.example.com:9092
//! </send-to-kafka>
//! ```
//!
//! ## Wiring it into a server
//! ```rust,no_run
//! use dhcpkit_kafka::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let config = SendToKafkaConfig::parse(
//!         "<send-to-kafka>\n  broker kafka1.example.com:9092\n</send-to-kafka>",
//!     )?;
//!     let handler = KafkaHandlerFactory::new(config).create()?;
//!     handler.worker_init().await;
//!
//!     // For every transaction:
//!     // handler.analyse_pre(&mut bundle).await;
//!     // ... the server builds the response ...
//!     // handler.analyse_post(&mut bundle).await;
//!
//!     handler.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! The Kafka client is built in: it speaks just enough of the protocol
//! (Metadata v1, Produce v3) to publish, and can bind to a configured
//! source address.
//!
//! ## Resources
//! - [Kafka Protocol Spec](https://kafka.apache.org/protocol.html)
//! - [RFC 8415: DHCPv6](https://www.rfc-editor.org/rfc/rfc8415)

#![forbid(unsafe_code)]

mod encode;
pub mod error;
mod parser;

pub mod client;
pub mod config;
pub mod constants;
pub mod dhcpv6;
pub mod handler;
pub mod messages;
pub mod telemetry;

pub mod prelude {
    //! Everything a host server needs to load and run the handler.
    pub use crate::config::{BrokerAddress, HostOrIp, SendToKafkaConfig, TopicName};
    pub use crate::dhcpv6::Message;
    pub use crate::error::{Error, KafkaCode, Result};
    pub use crate::handler::{
        Handler, HandlerFactory, KafkaHandler, KafkaHandlerFactory, TransactionBundle,
    };
    pub use crate::messages::{DhcpKafkaMessage, KafkaMessage, UnknownKafkaMessage};

    pub use bytes;
}
