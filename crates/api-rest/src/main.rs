//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, backed by the in-memory backend.
//!
//! ## Intended use
//! Useful for front-end development and debugging. The workspace's main `ica-run` binary does
//! the same but also loads `.env` first.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use ica_core::CoreConfig;

/// Main entry point for the incident capture REST API server
///
/// # Environment Variables
/// - `ICA_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `ICA_NARRATIVE_AUTOSAVE_MS`, `ICA_ANSWER_AUTOSAVE_MS`, `ICA_MIN_PHASE_CHARS`,
///   `ICA_ANSWER_COMPLETE_CHARS`: core configuration overrides
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("ICA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting incident capture REST API on {}", addr);

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("ICA_NARRATIVE_AUTOSAVE_MS").ok(),
        std::env::var("ICA_ANSWER_AUTOSAVE_MS").ok(),
        std::env::var("ICA_MIN_PHASE_CHARS").ok(),
        std::env::var("ICA_ANSWER_COMPLETE_CHARS").ok(),
    )?);

    api_rest::serve(&addr, AppState::in_memory(cfg)).await?;
    Ok(())
}
