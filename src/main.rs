use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use ica_core::CoreConfig;

/// Main entry point for the incident capture service
///
/// Loads `.env`, resolves the core configuration once and serves the REST API over the
/// in-memory backend.
///
/// # Environment Variables
/// - `ICA_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `ICA_NARRATIVE_AUTOSAVE_MS`: narrative debounce delay (default: 3000)
/// - `ICA_ANSWER_AUTOSAVE_MS`: answer debounce delay (default: 2000)
/// - `ICA_MIN_PHASE_CHARS`: minimum characters in one narrative phase (default: 50)
/// - `ICA_ANSWER_COMPLETE_CHARS`: answers longer than this are complete (default: 10)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ica=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("ICA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("ICA_NARRATIVE_AUTOSAVE_MS").ok(),
        std::env::var("ICA_ANSWER_AUTOSAVE_MS").ok(),
        std::env::var("ICA_MIN_PHASE_CHARS").ok(),
        std::env::var("ICA_ANSWER_COMPLETE_CHARS").ok(),
    )?);

    tracing::info!(
        narrative_autosave_ms = cfg.narrative_autosave_delay().as_millis() as u64,
        answer_autosave_ms = cfg.answer_autosave_delay().as_millis() as u64,
        "++ Starting incident capture REST on {}",
        rest_addr
    );

    api_rest::serve(&rest_addr, AppState::in_memory(cfg)).await?;
    Ok(())
}
