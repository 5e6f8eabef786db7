/// Installs a `tracing` subscriber printing to stderr.
///
/// The filter is read from `RUST_LOG` and falls back to `tsunagi=info`, so
/// `RUST_LOG=tsunagi=debug` shows every task as it runs and
/// `RUST_LOG=tsunagi=trace` also shows cache hits. Fails if a global
/// subscriber is already installed.
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tsunagi=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}
