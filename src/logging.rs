use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_JSON: &str = "XRPL_ESCROW_LOG_JSON";

/// Install the global subscriber. `RUST_LOG` filters (default `info`);
/// `XRPL_ESCROW_LOG_JSON=1` switches to JSON lines. Output goes to stderr so
/// command output on stdout stays machine-readable.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json_requested() {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}

fn json_requested() -> bool {
    std::env::var(ENV_LOG_JSON)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
