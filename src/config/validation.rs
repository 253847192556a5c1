//! Configuration validation functions.

use super::Config;

/// Validate configuration and warn about likely deployment mistakes.
///
/// Unlike the room engine's own transition-reject policy (silent, per
/// `spec.md` §7), config problems are surfaced loudly: `main.rs` propagates
/// this as a hard failure unless `--validate-config` requested a dry run.
pub fn validate_config_security(config: &Config) -> anyhow::Result<()> {
    if config.server.time_limit_secs == 0 {
        anyhow::bail!(
            "server.time_limit_secs must be a positive integer \
             (TIME_LIMIT falls back to the compiled default when unset or non-numeric, \
             but an explicit zero is rejected rather than silently producing a zero-second \
             answer window)"
        );
    }

    if config.catalog.api_key.trim().is_empty() && is_production_mode() {
        eprintln!(
            "\nWARNING: catalog.api_key is empty in a production deployment.\n\
             Playlist enumeration and embeddability probes will fail with CatalogError::Upstream\n\
             until INTRO_QUIZ__CATALOG__API_KEY is set.\n"
        );
    }

    Ok(())
}

/// Detect if we're running in production mode.
///
/// Checks `INTRO_QUIZ__ENVIRONMENT` or the generic `PRODUCTION` / `PROD`
/// environment variables.
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("INTRO_QUIZ__ENVIRONMENT") {
        return mode.eq_ignore_ascii_case("production") || mode.eq_ignore_ascii_case("prod");
    }

    env::var("INTRO_QUIZ_PRODUCTION").is_ok()
        || env::var("PRODUCTION").is_ok()
        || env::var("PROD").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_time_limit_is_rejected() {
        let mut config = Config::default();
        config.server.time_limit_secs = 0;
        assert!(validate_config_security(&config).is_err());
    }

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(validate_config_security(&config).is_ok());
    }
}
