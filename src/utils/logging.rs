//! Logging init: structured tracing output on stderr.

use tracing_subscriber::EnvFilter;

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,yt_trends=debug"
    } else {
        "info,yt_trends=info"
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Stdout is left to user-facing output; logs go to stderr without ANSI colors
/// so they stay readable in CI and container logs.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    if result.is_ok() {
        tracing::debug!("logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_crate_level() {
        assert!(default_filter(true).contains("yt_trends=debug"));
        assert!(default_filter(false).contains("yt_trends=info"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
