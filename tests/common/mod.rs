//! Helpers shared by the request-level test files.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use titanium_storefront::api::auth::issue_token;
use titanium_storefront::api::{router, AppState};
use titanium_storefront::config::Config;
use titanium_storefront::payments::{
    compute_signature, GatewayPayment, PaymentError, PaymentGateway, PaymentSession, SessionRequest,
};
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec";
pub const ADMIN_EMAIL: &str = "admin@titanium.test";
pub const SESSION_SECRET: &str = "session-signing-key";

pub fn config(extra: &[(&str, &str)]) -> Config {
    let mut pairs = vec![
        ("DATABASE_URL", "postgres://storefront@localhost/unused"),
        ("ADMIN_EMAIL", ADMIN_EMAIL),
        ("ADMIN_PASSWORD", "correct horse"),
        ("SESSION_SECRET", SESSION_SECRET),
    ];
    pairs.extend_from_slice(extra);
    Config::from_lookup(move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())).unwrap()
}

/// Gateway that reports every payment as approved and never opens sessions.
pub struct StubGateway {
    pub external_reference: Option<String>,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_session(&self, _request: &SessionRequest) -> Result<PaymentSession, PaymentError> {
        Err(PaymentError::Rejected { status: 503, body: "unavailable".into() })
    }

    async fn fetch_payment(&self, _payment_id: &str) -> Result<GatewayPayment, PaymentError> {
        Ok(GatewayPayment {
            status: "approved".into(),
            external_reference: self.external_reference.clone(),
            method: Some("pix".into()),
        })
    }
}

pub fn stub(external_reference: Option<&str>) -> Option<Arc<dyn PaymentGateway>> {
    Some(Arc::new(StubGateway { external_reference: external_reference.map(str::to_string) }))
}

pub fn app_with_pool(db: PgPool, config: Config, gateway: Option<Arc<dyn PaymentGateway>>) -> Router {
    router(AppState::new(db, config).with_gateway(gateway))
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    json_request("POST", uri, body)
}

/// Same request with a valid back-office token attached.
pub fn as_admin(mut request: Request<Body>) -> Request<Body> {
    let token = issue_token(SESSION_SECRET, ADMIN_EMAIL, Utc::now() + Duration::hours(1));
    request.headers_mut().insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
    request
}

/// A payment notification signed with [`WEBHOOK_SECRET`].
pub fn signed_notification(payment_id: &str) -> Request<Body> {
    let ts = "1700000000";
    let v1 = compute_signature(WEBHOOK_SECRET, payment_id, "req-1", ts);
    Request::builder()
        .method("POST")
        .uri(format!("/webhooks/mercadopago?data.id={payment_id}"))
        .header("x-signature", format!("ts={ts},v1={v1}"))
        .header("x-request-id", "req-1")
        .body(Body::from("{}"))
        .unwrap()
}
