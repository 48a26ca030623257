//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes allocation events to consumers after the allocation store
//! committed them. It makes minimal assumptions:
//!
//! - **Transport-agnostic**: in-memory channels today, a broker later.
//! - **At-least-once delivery**: consumers must be idempotent.
//! - **No persistence**: the allocation store is the source of truth; a lost
//!   notification never loses a ledger posting.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// A subscription to an event stream.
///
/// Designed for single-threaded consumption: one consumer per subscription,
/// draining with `try_recv` after each commit it cares about.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// `publish()` is called by the allocation service once a commit has succeeded;
/// a publish failure is logged and never rolls back the commit.
///
/// Broadcast semantics: each subscriber gets a copy of every published message.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}


