//! Tracing subscriber setup.
//!
//! The engine logs through `tracing` with structured fields; the host decides
//! where output goes. This helper wires the default stderr subscriber and is
//! safe to call more than once.

/// Initialize the global tracing subscriber with stderr output.
///
/// `level` is the minimum level when `RUST_LOG` is unset. Subsequent calls
/// are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}
