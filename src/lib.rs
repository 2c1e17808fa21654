pub mod assets;
pub mod config;
pub mod detection;
pub mod gateway;
pub mod intake;
pub mod server;

/// Logging setup shared by the binary
pub mod util {
    use tracing_subscriber::EnvFilter;

    /// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`
    pub fn init_tracing(default_filter: &str) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
