use tracing_subscriber::EnvFilter;

/// Route tracing (and llama.cpp's own logs) to stderr, filtered by `RUST_LOG`.
/// Stays quiet by default so the chat is not interleaved with diagnostics.
pub fn setup_tracing() {
    gg::send_logs_to_tracing(gg::LogOptions::default().with_logs_enabled(true));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .try_init();
}
