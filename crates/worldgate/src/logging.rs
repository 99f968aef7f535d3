//! Tracing setup for binaries built on Worldgate.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` (e.g. `"worldgate_session=debug"`)
/// when `RUST_LOG` is unset or invalid. Returns `false` if a global
/// subscriber was already installed, which leaves that one in place.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let directives = filter.to_string();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(filter = %directives, "tracing initialised");
    }
    installed
}
