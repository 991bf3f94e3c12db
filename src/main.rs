mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod pipeline;
mod repository;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use pipeline::Pipeline;
use repository::PgTenderRepository;
use services::{AiClient, SupabaseStorage};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        context_token_budget = settings.generation.context_token_budget,
        "Starting tender drafting backend"
    );

    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    // Shared by JWKS fetches and storage calls
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;

    let ai_client = AiClient::new(
        &settings.ai_service_url,
        &settings.ai_service_token,
        settings.ai_model.clone(),
        settings.ai_service_timeout_seconds,
    )?;

    // Non-blocking: a slow AI service must not delay startup
    tokio::spawn({
        let ai_client = ai_client.clone();
        async move {
            match ai_client.health_check().await {
                Ok(()) => tracing::info!("AI service is healthy"),
                Err(e) => tracing::warn!(error = %e, "AI service health check failed - will retry on first request"),
            }
        }
    });

    let storage = SupabaseStorage::new(
        http_client.clone(),
        &settings.supabase_url,
        &settings.storage_bucket,
        &settings.supabase_service_role_key,
    )?;

    let jwks_cache = auth::JwksCache::new(
        http_client,
        settings.supabase_jwt_jwks_url.clone(),
        settings.supabase_jwt_issuer.clone(),
        settings.supabase_jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    );

    if let Err(e) = jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    let repo = Arc::new(PgTenderRepository::new(pool.clone()));
    let pipeline = Pipeline::new(
        Arc::new(ai_client),
        Arc::new(storage),
        settings.generation.clone(),
    );

    let state = app::AppState::new(pool, settings.clone(), jwks_cache, repo, pipeline);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
