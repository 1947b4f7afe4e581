use banter_core::{AppConfig, CoreError};
use database::Database;
use engagement_scheduler::{EngagementScheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use twitter_client::TwitterClient;

mod api;

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "banter=debug,engagement_scheduler=debug,twitter_client=info,database=info".into()
            }),
        )
        .init();

    tracing::info!("Starting Banter - social engagement scheduler");

    let config = AppConfig::from_env()?;

    let db = Arc::new(Database::connect(&config.database_url).await?);
    db.run_migrations().await?;
    // The policy must exist before the scheduler ever starts.
    db.ensure_policy().await?;
    db.seed_default_templates().await?;

    let client = Arc::new(TwitterClient::new(&config.platform));

    let scheduler = Arc::new(
        EngagementScheduler::new(db.clone(), client.clone(), db.clone()).with_config(
            SchedulerConfig {
                poll_interval: Duration::from_secs(config.polling_interval_minutes * 60),
                ..SchedulerConfig::default()
            },
        ),
    );

    let state = api::AppState {
        db,
        client,
        scheduler: scheduler.clone(),
    };
    let router = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Admin API listening on {}", config.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Banter shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
