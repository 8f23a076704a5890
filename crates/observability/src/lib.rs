//! Process-wide logging setup shared by the binaries.

/// Initialize process-wide tracing with the default filter.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    self::tracing::init();
}

/// Tracing configuration (filter, output format).
pub mod tracing;

pub use self::tracing::{DEFAULT_FILTER, LogFormat, init_with};
