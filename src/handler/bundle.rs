//! The per-transaction object handlers work on.

use std::any::Any;
use std::collections::HashMap;

use crate::dhcpv6::Message;

/// Per-handler scratch space that lives as long as one transaction.
///
/// Every handler gets its own slot, identified by [`HandlerId`], so several
/// instances of the same handler don't see each other's data.
#[derive(Default)]
pub struct HandlerData {
    slots: HashMap<HandlerId, Box<dyn Any + Send + Sync>>,
}

/// Identifies one handler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

impl HandlerId {
    /// A process-wide unique id.
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        HandlerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl HandlerData {
    pub fn insert<T: Any + Send + Sync>(&mut self, id: HandlerId, value: T) {
        self.slots.insert(id, Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, id: HandlerId) -> Option<&T> {
        self.slots.get(&id).and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self, id: HandlerId) -> Option<&mut T> {
        self.slots.get_mut(&id).and_then(|v| v.downcast_mut())
    }

    /// Take the value out. A value of another type is left in place.
    pub fn remove<T: Any + Send + Sync>(&mut self, id: HandlerId) -> Option<T> {
        if !self.slots.get(&id).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.slots
            .remove(&id)
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for HandlerData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.slots.keys()).finish()
    }
}

/// A request received by the server and the response it is going to send.
#[derive(Debug)]
pub struct TransactionBundle {
    pub incoming_message: Message,
    /// Filled in by the server before the post-analysis handlers run.
    pub outgoing_message: Option<Message>,
    pub handler_data: HandlerData,
}

impl TransactionBundle {
    pub fn new(incoming_message: Message) -> Self {
        Self {
            incoming_message,
            outgoing_message: None,
            handler_data: HandlerData::default(),
        }
    }
}
