use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roilens_gateway::server;
use roilens_gateway::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so the configured log level can seed the filter
    let config = roilens_core::Config::load()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.settings.logging.level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Configuration loaded (chat deployment: {}, document models: {})",
        config
            .secrets
            .chat_deployment
            .as_deref()
            .unwrap_or("unset"),
        config.settings.documents.model_chain.join(", ")
    );

    if config.settings.gateway.host != "127.0.0.1" && config.settings.gateway.host != "localhost" {
        warn!(
            "Gateway binding to non-localhost address: {}. This may expose the API to remote access.",
            config.settings.gateway.host
        );
    }

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(config)?);

    info!("Starting roilens gateway on {}", bind_addr);
    server::run(state, &bind_addr).await
}
