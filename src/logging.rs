use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sets the logging (tracing) level using RUST_LOG, falling back to the
/// supplied default log settings. Logs go to stderr; stdout is reserved for
/// the run report.
pub fn setup_logging(default_log_settings: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_log_settings.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init()
}

/// Default filter for a `-v` count.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "sitemap_gen=warn",
        1 => "sitemap_gen=info",
        2 => "sitemap_gen=debug",
        _ => "sitemap_gen=trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(default_filter(0), "sitemap_gen=warn");
        assert_eq!(default_filter(1), "sitemap_gen=info");
        assert_eq!(default_filter(2), "sitemap_gen=debug");
        assert_eq!(default_filter(9), "sitemap_gen=trace");
    }
}
