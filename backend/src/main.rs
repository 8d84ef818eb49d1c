mod aggregate;
mod auth;
mod config;
mod error;
mod locale;
mod models;
mod prompt;
mod relay;
mod report;
mod routes;
mod services;
mod store;

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::relay::ChatClient;
use crate::routes::AppState;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("ENV").ok().as_deref() != Some("prod") {
        dotenvy::dotenv().ok();
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        chat: ChatClient::new(&cfg.ai)?,
        locale: cfg.locale,
        jwt_secret: cfg.jwt_secret.as_str().into(),
    };
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
