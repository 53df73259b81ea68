use std::io::IsTerminal;

use tracing_subscriber::{fmt, EnvFilter};

/// Directive always enabled for this crate, on top of any `RUST_LOG` value.
pub const DEFAULT_FILTER: &str = "resilient_http=debug";

/// Installs a global subscriber that writes diagnostic events to stderr.
///
/// Honors `RUST_LOG` for other targets, but this crate's events stay at
/// debug so the `debug` client option alone decides what is written.
/// Colors are used only when stderr is a terminal. Returns `false` if a
/// global subscriber was already installed.
pub fn init_stderr_logging() -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    fmt()
        .with_env_filter(stderr_filter(env.as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init()
        .is_ok()
}

fn stderr_filter(env: Option<&str>) -> EnvFilter {
    let filter = EnvFilter::new(env.unwrap_or_default());
    match DEFAULT_FILTER.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

#[cfg(test)]
mod tests {
    use super::{init_stderr_logging, stderr_filter};

    #[test]
    fn second_install_is_a_no_op() {
        init_stderr_logging();
        assert!(!init_stderr_logging());
    }

    #[test]
    fn crate_directive_survives_rust_log() {
        for env in [None, Some("warn"), Some("resilient_http=off,hyper=info")] {
            let filter = stderr_filter(env).to_string();
            assert!(filter.contains("resilient_http=debug"), "{env:?} -> {filter}");
            assert!(!filter.contains("resilient_http=off"), "{env:?} -> {filter}");
        }
        assert!(stderr_filter(Some("warn")).to_string().contains("warn"));
    }
}
