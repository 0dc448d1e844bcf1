//! Logging setup
//!
//! Logs go to stderr so `--json` output on stdout stays machine readable.
//! `RUST_LOG` wins over `--verbose` when set.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `verbosity` is the number of `-v` flags
pub fn init_logging(verbosity: u8) {
    let default_directives = match verbosity {
        0 => "warn",
        1 => "warn,esgf_status=info,esgf_status_core=info",
        _ => "info,esgf_status=debug,esgf_status_core=debug",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .init();
}
