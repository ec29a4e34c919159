//! Logging bootstrap.
//!
//! The library only emits `tracing` events; nothing is printed until the
//! embedding application installs a subscriber. [`init_logging`] installs a
//! compact `fmt` subscriber filtered by `RUST_LOG`.
//!
//! Targets used:
//! - `dynwrap::handle`: reference acquisition and release (`trace`)
//! - `dynwrap::convert`: conversion mismatches (`trace`)
//! - `dynwrap::object`: attribute lookups, calls and script loads (`debug`)
//! - `dynwrap::allocate`: runtime faults during allocation (`error`)

use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "dynwrap=info";

/// Install the default subscriber. Later calls are no-ops.
pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Install the default subscriber with a fallback filter directive.
pub fn init_logging_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .ok(); // Already initialized by the host or an earlier call
}
