//! Mercado Pago payment notifications.
//!
//! The gateway retries anything that is not a 2xx, so the handler only
//! answers otherwise for a bad signature (401) or missing credentials (500).
//! Every other failure is logged and acknowledged; the order keeps its
//! previous status for manual reconciliation.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use super::AppState;
use crate::domain::aggregates::TransitionError;
use crate::payments::{is_payment_id, map_payment_status, verify_webhook_signature};
use crate::services::orders::{self, OrderKey};
use crate::StoreError;

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/mercadopago", post(mercadopago))
}

type Reply = (StatusCode, Json<Value>);

fn reply(status: StatusCode, ok: bool) -> Reply { (status, Json(json!({ "ok": ok }))) }

/// Payment id from `?data.id=`, `?id=`, then the body's `data.id` or `id`.
/// Anything but digits is treated as absent.
fn notification_data_id(params: &HashMap<String, String>, body: &Value) -> Option<String> {
    let from_body = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    params
        .get("data.id")
        .cloned()
        .filter(|s| !s.is_empty())
        .or_else(|| params.get("id").cloned().filter(|s| !s.is_empty()))
        .or_else(|| body.pointer("/data/id").and_then(from_body))
        .or_else(|| body.get("id").and_then(from_body))
        .map(|s| s.trim().to_string())
        .filter(|s| is_payment_id(s))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn mercadopago(
    State(s): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let Some(gateway) = s.gateway.clone() else {
        tracing::error!("payment notification received but the gateway is not configured");
        return reply(StatusCode::INTERNAL_SERVER_ERROR, false);
    };

    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let Some(payment_id) = notification_data_id(&params, &body) else {
        return reply(StatusCode::OK, true);
    };

    if let Err(err) = verify_webhook_signature(
        s.config.payments.webhook_secret.as_deref(),
        header(&headers, "x-signature"),
        header(&headers, "x-request-id"),
        &payment_id,
    ) {
        tracing::warn!(payment_id = %payment_id, error = %err, "payment notification rejected");
        return reply(StatusCode::UNAUTHORIZED, false);
    }

    let payment = match gateway.fetch_payment(&payment_id).await {
        Ok(payment) => payment,
        Err(err) => {
            tracing::error!(payment_id = %payment_id, error = %err, "could not fetch payment");
            return reply(StatusCode::OK, true);
        }
    };

    let Some(order_number) = payment.external_reference else {
        tracing::info!(payment_id = %payment_id, "payment has no order reference");
        return reply(StatusCode::OK, true);
    };

    let status = map_payment_status(&payment.status);
    let key = OrderKey::Number(order_number.clone());
    match orders::apply_status_change(&s.db, &key, status).await {
        Ok((mut order, Some(_))) => s.publish(order.take_events()).await,
        Ok((_, None)) => {}
        Err(StoreError::Transition(TransitionError::NotFound)) => {
            tracing::warn!(order_number = %order_number, payment_id = %payment_id, "payment for unknown order");
        }
        Err(err) => {
            tracing::error!(
                order_number = %order_number,
                payment_id = %payment_id,
                payment_status = %payment.status,
                error = %err,
                "payment status could not be applied"
            );
        }
    }
    reply(StatusCode::OK, true)
}
