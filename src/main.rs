//! Titanium storefront: catalog, checkout and back-office API.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use titanium_storefront::api::{self, AppState};
use titanium_storefront::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("could not connect to the database")?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "NATS unavailable, events will not be published");
                None
            }
        },
        None => None,
    };
    if config.payments.access_token.is_none() {
        tracing::warn!("MP_ACCESS_TOKEN not set, payment endpoints are disabled");
    }

    let port = config.port;
    let app = api::router(AppState::new(db, config).with_nats(nats));

    tracing::info!("Titanium storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
