//! Handlers the DHCPv6 server calls for every transaction.
//!
//! The server creates one handler per configuration section through its
//! [`HandlerFactory`], calls [`Handler::worker_init`] once in every worker,
//! and then for each transaction [`Handler::analyse_pre`] before and
//! [`Handler::analyse_post`] after the response has been built.

mod bundle;
mod kafka;

pub use bundle::{HandlerData, HandlerId, TransactionBundle};
pub use kafka::{Connector, KafkaHandler, KafkaHandlerFactory, ProducerConnector, Publisher};

use async_trait::async_trait;

use crate::error::Result;

/// A transaction observer. All methods default to doing nothing.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Set up per-worker state, like network connections.
    async fn worker_init(&self) {}

    /// Look at a transaction before the response is built.
    async fn analyse_pre(&self, _bundle: &mut TransactionBundle) {}

    /// Look at a transaction after the response is built.
    async fn analyse_post(&self, _bundle: &mut TransactionBundle) {}

    /// Release resources when the handler is removed or reloaded.
    async fn shutdown(&self) {}
}

/// Turns a configuration record into a handler.
pub trait HandlerFactory: Send + Sync {
    type Handler: Handler;

    fn create(&self) -> Result<Self::Handler>;
}
