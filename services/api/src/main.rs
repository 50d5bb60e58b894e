use anyhow::{Context, Result};
use interview_api::config::Config;
use interview_api::{AppState, router};
use interview_core::gateway::OpenAiClient;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Build the Router ---
    let client = OpenAiClient::new(config.openai_api_key, config.chat_model.clone())
        .with_base_url(config.openai_base_url);
    if !client.is_configured() {
        tracing::warn!("OPENAI_API_KEY is not set; every /api/ask request will fail with 500");
    }
    let app = router(AppState::new(client));

    // --- 4. Serve ---
    info!(
        "Interview proxy listening on {} (model {})",
        config.bind_address, config.chat_model
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    axum::serve(listener, app).await?;

    Ok(())
}
