use tracing_subscriber::EnvFilter;

use crate::config::Config;

fn level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a fmt subscriber at the level implied by `cfg.verbose`.
/// `RUST_LOG`, when set, takes precedence.
pub fn init(cfg: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(cfg.verbose))
        .init();
}

/// Like [`init`], but a no-op if a global subscriber is already installed.
pub fn try_init(cfg: &Config) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(cfg.verbose))
        .try_init()
        .is_ok()
}

fn filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(verbose)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level(0), "warn");
        assert_eq!(level(1), "info");
        assert_eq!(level(2), "debug");
        assert_eq!(level(9), "trace");
    }

    #[test]
    fn test_try_init_is_idempotent() {
        try_init(&Config::default());
        let chatty = Config { verbose: 3, ..Config::default() };
        assert!(!try_init(&chatty), "second install must be refused");
    }

    #[test]
    fn test_config_verbosity_from_json() {
        let cfg = Config::from_json(r#"{"verbose": 2}"#).unwrap();
        assert_eq!(level(cfg.verbose), "debug");
        assert_eq!(level(Config::default().verbose), "warn");
    }
}
