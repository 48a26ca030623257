//! Infrastructure layer for the allocation engine.
//!
//! Everything with IO or shared state lives here: the allocation store (in-memory
//! and Postgres), the collaborator ports, the credit memo balance tracker, and
//! the services composing them into the commit, preview and summary paths.

pub mod aggregator;
pub mod config;
pub mod credit_tracker;
pub mod ports;
pub mod preview;
pub mod read_model;
pub mod service;
pub mod store;


pub use aggregator::InvoiceBalanceAggregator;
pub use config::{AppConfig, ConfigError, SeedData};
pub use preview::{PreviewService, SplitPreview};
pub use service::AllocationService;
pub use store::{AllocationStore, InMemoryAllocationStore, PostgresAllocationStore, StoreError};
