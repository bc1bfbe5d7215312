use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise both crates log at `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "solaredge_ingest={default_level},solaredge_fetch={default_level},solaredge_client={default_level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
