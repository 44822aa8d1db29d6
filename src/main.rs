use anyhow::Context;

mod app;
mod clock;
mod config;
mod llm;
mod meals;
mod media;
mod messages;
mod messaging;
mod reports;
mod routing;
mod state;
mod storage;
mod store;
mod summary;
#[cfg(test)]
mod testing;
mod tools;
mod users;
mod webhook;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "mealcoach=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;

    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to postgres")?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let reports_enabled = config.reports_enabled;
    let state = AppState::init(config, db).await?;

    if reports_enabled {
        state.scheduler.start();
    } else {
        tracing::info!("scheduled reports disabled");
    }

    let scheduler = state.scheduler.clone();
    let result = app::serve(app::build_app(state)).await;
    scheduler.stop();
    result
}
