//! Request-level tests for the paths that answer before touching the
//! database. The pool is lazy and never connects.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{config, get, post_json, send, signed_notification, stub, WEBHOOK_SECRET};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use titanium_storefront::config::Config;
use titanium_storefront::payments::PaymentGateway;

fn app(config: Config, gateway: Option<Arc<dyn PaymentGateway>>) -> Router {
    let db = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
    common::app_with_pool(db, config, gateway)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(config(&[]), None), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let (status, body) = send(app(config(&[]), None), get("/admin/pedidos")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Não autorizado");

    let request = Request::builder()
        .uri("/admin/produtos")
        .header(header::AUTHORIZATION, "Bearer forged.token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(config(&[]), None), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_login() {
    let wrong = json!({ "email": "admin@titanium.test", "password": "guess" });
    let (status, _) = send(app(config(&[]), None), post_json("/admin/login", wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let right = json!({ "email": "Admin@Titanium.test", "password": "correct horse" });
    let (status, body) = send(app(config(&[]), None), post_json("/admin/login", right)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["expiresAt"].is_string());
}

#[tokio::test]
async fn test_coupon_validation_requires_code_and_subtotal() {
    let (status, body) = send(app(config(&[]), None), post_json("/cupom/validar", json!({ "subtotal": 100 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let body = json!({ "code": "TITAN10", "subtotal": 0 });
    let (status, _) = send(app(config(&[]), None), post_json("/cupom/validar", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_tracking_requires_number() {
    let (status, body) = send(app(config(&[]), None), get("/pedidos/buscar?numero=%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Número do pedido é obrigatório");
}

#[tokio::test]
async fn test_customer_lookup_without_digits() {
    let (status, body) = send(app(config(&[]), None), get("/clientes/abc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
}

#[tokio::test]
async fn test_checkout_rejects_invalid_payload() {
    let body = json!({ "customer": { "name": "Ana", "email": "ana@example.com" }, "items": [] });
    let (status, body) = send(app(config(&[]), None), post_json("/pedidos/criar", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Dados inválidos");
}

#[tokio::test]
async fn test_preference_without_gateway() {
    let (status, body) = send(app(config(&[]), None), post_json("/pagamentos/mercadopago/preference", json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Mercado Pago não configurado");
}

#[tokio::test]
async fn test_webhook_without_gateway() {
    let (status, body) = send(app(config(&[]), None), post_json("/webhooks/mercadopago?data.id=1", json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_webhook_without_data_id_is_acknowledged() {
    let app = app(config(&[("MP_WEBHOOK_SECRET", WEBHOOK_SECRET)]), stub(Some("TIT-1")));
    let (status, body) = send(app, post_json("/webhooks/mercadopago", json!({ "type": "payment" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_webhook_bad_signature() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/mercadopago?data.id=123")
        .header("x-signature", "ts=1700000000,v1=deadbeef")
        .header("x-request-id", "req-1")
        .body(Body::from("{}"))
        .unwrap();
    let app = app(config(&[("MP_WEBHOOK_SECRET", WEBHOOK_SECRET)]), stub(Some("TIT-1")));
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_webhook_signed_payment_without_reference() {
    let app = app(config(&[("MP_WEBHOOK_SECRET", WEBHOOK_SECRET)]), stub(None));
    let (status, body) = send(app, signed_notification("123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_webhook_non_numeric_payment_id_is_acknowledged() {
    let app = app(config(&[("MP_WEBHOOK_SECRET", WEBHOOK_SECRET)]), stub(Some("TIT-1")));
    let (status, body) = send(app, post_json("/webhooks/mercadopago?data.id=..%2F..%2Fusers", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_checkout_rejects_amounts_beyond_money_columns() {
    let customer = json!({ "name": "Ana", "email": "ana@example.com" });
    let huge_price = json!({
        "customer": customer,
        "items": [{ "productId": 1, "quantity": 1, "unitPrice": 1e20 }]
    });
    let (status, body) = send(app(config(&[]), None), post_json("/pedidos/criar", huge_price)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Dados inválidos");

    let huge_quantity = json!({
        "customer": customer,
        "items": [{ "productId": 1, "quantity": 2147483647, "unitPrice": 10 }]
    });
    let (status, _) = send(app(config(&[]), None), post_json("/pedidos/criar", huge_quantity)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let overflowing_sum = json!({
        "customer": customer,
        "items": [
            { "productId": 1, "quantity": 10000, "unitPrice": 9999999999.0 },
            { "productId": 2, "quantity": 10000, "unitPrice": 9999999999.0 }
        ]
    });
    let (status, _) = send(app(config(&[]), None), post_json("/pedidos/criar", overflowing_sum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_coupon_validation_rejects_huge_subtotal() {
    let body = json!({ "code": "TITAN10", "subtotal": 1e20 });
    let (status, body) = send(app(config(&[]), None), post_json("/cupom/validar", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
