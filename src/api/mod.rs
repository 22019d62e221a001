//! HTTP surface: shared state, the router and its route groups.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod extract;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domain::aggregates::CartStore;
use crate::domain::events::DomainEvent;
use crate::payments::{MercadoPagoClient, PaymentGateway};
use crate::services::carts::PgCartStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    /// `None` when no access token is configured.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub carts: Arc<dyn CartStore>,
    pub nats: Option<async_nats::Client>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let gateway = config.payments.access_token.as_ref().map(|token| {
            Arc::new(MercadoPagoClient::new(&config.payments.api_base, token, &config.site_url))
                as Arc<dyn PaymentGateway>
        });
        Self {
            carts: Arc::new(PgCartStore::new(db.clone())),
            db,
            config: Arc::new(config),
            gateway,
            nats: None,
        }
    }

    pub fn with_gateway(mut self, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_nats(mut self, nats: Option<async_nats::Client>) -> Self {
        self.nats = nats;
        self
    }

    /// Best effort: a failed publish never fails the request that raised it.
    pub(crate) async fn publish(&self, events: Vec<DomainEvent>) {
        let Some(nats) = &self.nats else { return };
        for event in events {
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(subject = event.subject(), error = %err, "event could not be encoded");
                    continue;
                }
            };
            if let Err(err) = nats.publish(event.subject().to_string(), payload.into()).await {
                tracing::warn!(subject = event.subject(), error = %err, "event publish failed");
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "healthy", "service": "titanium-storefront" })) }))
        .merge(catalog::routes())
        .merge(checkout::routes())
        .merge(cart::routes())
        .merge(webhooks::routes())
        .merge(admin::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
