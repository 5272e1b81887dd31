//! Logging bootstrap (spec §9: "diagnostic, not correctness" — sanitised
//! warning text is a presentation concern, not a quality-metric input).
//!
//! Grounded on the teacher's `main.rs` initialisation: `tracing_subscriber`
//! with an `RUST_LOG`-driven `EnvFilter`, defaulting to `info`.

pub mod sanitize;

use tracing_subscriber::EnvFilter;

/// Verbosity requested via `-v`/`-vv` (spec §6.1), layered on top of
/// `RUST_LOG` when the environment variable isn't set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    fn default_filter(self) -> &'static str {
        match self {
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Debug => "trace",
        }
    }
}

/// Installs the global tracing subscriber. Safe to call once at process
/// start; a second call is a startup bug, not a runtime condition, so it
/// panics like `tracing_subscriber`'s own `set_global_default`.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels_escalate_the_default_filter() {
        assert_eq!(Verbosity::Normal.default_filter(), "info");
        assert_eq!(Verbosity::Verbose.default_filter(), "debug");
        assert_eq!(Verbosity::Debug.default_filter(), "trace");
    }
}
