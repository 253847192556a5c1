#![cfg_attr(not(test), deny(clippy::panic))]

use axum::Router;
use clap::Parser;
use intro_quiz_server::catalog::HttpCatalogAdapter;
use intro_quiz_server::config;
use intro_quiz_server::logging;
use intro_quiz_server::room::RoomEngine;
use intro_quiz_server::websocket;
use std::net::SocketAddr;
use std::sync::Arc;

/// Intro Quiz -- room engine server for the real-time intro-quiz game
#[derive(Parser, Debug)]
#[command(name = "intro-quiz-server")]
#[command(about = "A lightweight, in-memory room engine for a real-time intro-quiz game")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = Arc::new(config::load());

    // Handle --print-config: output the loaded configuration as JSON
    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // Validate configuration. Note: config::load() already calls
    // validate_config_security() but only logs warnings and continues. Here
    // we capture the result to provide a proper exit code for
    // --validate-config mode and to fail startup on a hard error.
    let validation_result = config::validate_config_security(&cfg);

    // Handle --validate-config: exit after validation
    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Answer window (seconds): {}", cfg.server.time_limit_secs);
                println!("  Catalog base URL: {}", cfg.catalog.base_url);
                println!("  Catalog page size: {}", cfg.catalog.page_size);
                println!("  CORS origins: {}", cfg.cors_origins);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    // In normal operation, propagate validation errors.
    validation_result?;

    // Initialize logging from config.
    logging::init_with_config(&cfg.logging);

    let port: u16 = cfg.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "Starting intro-quiz room engine server");

    let catalog = Arc::new(HttpCatalogAdapter::new(cfg.catalog.clone()));
    let engine = Arc::new(RoomEngine::new(catalog, &cfg.server));

    let app: Router<()> = websocket::create_router(&cfg.cors_origins).with_state(engine);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.cors_origins,
        "Server started over HTTP - WebSocket protocol at /ws, liveness at /health"
    );

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["intro-quiz-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_long() {
        let cli = Cli::try_parse_from(["intro-quiz-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["intro-quiz-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["intro-quiz-server", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        let result =
            Cli::try_parse_from(["intro-quiz-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_cli_help_contains_flags() {
        let result = Cli::try_parse_from(["intro-quiz-server", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        let help_text = err.to_string();
        assert!(help_text.contains("--validate-config"));
        assert!(help_text.contains("--print-config"));
        assert!(help_text.contains("-c"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["intro-quiz-server", "--version"]);
        assert!(result.is_err());
    }
}
