use tracing_subscriber::EnvFilter;

/// Set this (to anything) for debug output from this crate.
pub const DEBUG_ENV: &str = "DBCHAT_DEBUG";

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "warn,db_chat=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `DBCHAT_DEBUG`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_directives(std::env::var_os(DEBUG_ENV).is_some()))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for debug in [false, true] {
            assert!(default_directives(debug).parse::<EnvFilter>().is_ok());
        }
        assert!(default_directives(true).contains("db_chat=debug"));
    }
}
