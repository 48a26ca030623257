//! Process-wide tracing setup shared by the binaries.

/// Subscriber installation (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, TracingOptions};

/// Initialize tracing with the defaults: `RUST_LOG` filter (fallback `info`) and
/// JSON lines on stdout.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    crate::tracing::init(&TracingOptions::from_env());
}
