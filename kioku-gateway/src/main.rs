use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kioku_core::{Config, ConfigError, ProviderType};
use kioku_gateway::chat::{AnswerGenerator, AnswerSettings};
use kioku_gateway::providers::Provider;
use kioku_gateway::providers::gemini::GeminiClient;
use kioku_gateway::server;
use kioku_gateway::state::AppState;
use kioku_knowledge::KnowledgeEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first, the log level default lives in it
    let config = Config::load()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.settings.logging.level.as_str().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Configuration loaded (generation: {}/{})",
        config.generation_provider(),
        config.generation_model()
    );

    let generation = &config.settings.generation;
    let provider: Arc<dyn Provider> = match config.generation_provider() {
        ProviderType::Gemini => {
            let api_key = config
                .gemini_api_key()
                .ok_or(ConfigError::ProviderNotConfigured(ProviderType::Gemini))?;
            Arc::new(GeminiClient::new(
                api_key,
                &generation.model,
                Duration::from_secs(generation.timeout_seconds),
            )?)
        }
    };

    let knowledge_settings = config.knowledge_settings();
    let answer_settings = AnswerSettings::from_config(generation, &knowledge_settings);
    let engine = Arc::new(KnowledgeEngine::open(knowledge_settings).await?);

    let answerer = AnswerGenerator::new(Arc::clone(&engine), provider, answer_settings);
    let state = Arc::new(AppState::new(engine, answerer));

    if config.settings.gateway.host != "127.0.0.1" && config.settings.gateway.host != "localhost" {
        warn!(
            "Gateway binding to non-localhost address: {}. This may expose the API to remote access.",
            config.settings.gateway.host
        );
    }

    let bind_addr = config.bind_addr();
    info!("Starting kioku server on {}", bind_addr);
    server::run(state, &bind_addr).await
}
