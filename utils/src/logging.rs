//! Structured logging initialization via `tracing`.

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise `verbose` selects
/// debug-level output, matching the tools' `-v` flag.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
