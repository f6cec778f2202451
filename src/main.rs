use std::sync::Arc;

use anyhow::Context;
use session_auth::{
    app::{build_app, serve},
    auth::{password::warm_decoy, sweeper::spawn_sweeper},
    config::AppConfig,
    db,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "session_auth=debug,axum=info,tower_http=info".to_string());
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

    let config = Arc::new(AppConfig::from_env().context("load configuration")?);
    let addr = config.bind_addr()?;
    let pool = db::connect(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("run migrations")?;

    warm_decoy().await.context("build decoy password hash")?;

    let app_state = AppState::from_pool(pool, config.clone());
    let _sweeper = spawn_sweeper(app_state.auth.clone(), config.sweep_interval());

    serve(build_app(app_state), addr).await
}
