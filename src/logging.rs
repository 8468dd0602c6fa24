use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,eventfilter=info",
        1 => "info,eventfilter=debug",
        _ => "debug,eventfilter=trace",
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `-v`.
/// Calling it twice is harmless.
pub fn init(verbose: u8, no_color: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbose)));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!no_color);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_crate_level() {
        assert!(level_for(0).contains("eventfilter=info"));
        assert!(level_for(1).contains("eventfilter=debug"));
        assert!(level_for(5).contains("eventfilter=trace"));
    }
}
