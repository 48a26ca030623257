//! Allocation events and the in-process bus they are published on.
//!
//! Events are facts emitted **after** a commit succeeded (a credit was applied,
//! a discount was reversed, ...). Consumers (audit log, realtime UI refresh) treat
//! them as notifications; the allocation store stays the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
