use tracing_subscriber::EnvFilter;

/// Installs a global tracing subscriber. `RUST_LOG` wins over
/// `fallback_filter`. Later calls are no-ops, so every client constructor
/// may call it.
pub fn init_tracing(fallback_filter: &str) {
    let env_filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(fallback_filter));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
