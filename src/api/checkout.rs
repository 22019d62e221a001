//! Public checkout endpoints: customer autofill, coupon validation, order
//! placement, hosted payment sessions and order tracking.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::error::ApiError;
use super::extract::{money, ValidatedJson};
use super::AppState;
use crate::domain::aggregates::{CustomerSummary, NewOrderLine};
use crate::domain::value_objects::Cpf;
use crate::payments::{PaymentGateway, SessionItem, SessionRequest};
use crate::services::checkout::{self, CheckoutCustomer, CheckoutRequest, ClaimedTotals};
use crate::services::orders::{self, OrderKey};
use crate::services::{coupons, customers};

const DEFAULT_PAYMENT_METHOD: &str = "pix";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clientes/:cpf", get(find_customer))
        .route("/cupom/validar", post(validate_coupon))
        .route("/pedidos/criar", post(create_order))
        .route("/pedidos/buscar", get(find_order))
        .route("/pagamentos/mercadopago/preference", post(create_preference))
}

// =============================================================================
// Request schemas
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderLinePayload {
    pub product_id: i32,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
    #[validate(custom = "money")]
    pub unit_price: Decimal,
    pub title: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub customer: Option<CustomerPayload>,
    #[serde(default)]
    pub items: Vec<OrderLinePayload>,
    pub subtotal: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub discount_code_id: Option<i32>,
    #[validate(custom = "money")]
    pub shipping_cost: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub payment_method: Option<String>,
}

impl CheckoutPayload {
    fn into_request(self) -> Result<CheckoutRequest, ApiError> {
        let customer = self.customer.ok_or_else(ApiError::invalid_data)?;
        if self.items.is_empty() {
            return Err(ApiError::invalid_data());
        }
        customer.validate()?;
        for item in &self.items {
            item.validate()?;
        }

        Ok(CheckoutRequest {
            customer: CheckoutCustomer {
                cpf: customer.cpf.as_deref().and_then(Cpf::normalize),
                name: customer.name.trim().to_string(),
                email: customer.email.trim().to_string(),
                phone: customer.phone.filter(|p| !p.trim().is_empty()),
                address: customer.address.filter(|a| !a.trim().is_empty()),
            },
            lines: self
                .items
                .into_iter()
                .map(|item| NewOrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    title: item.title.or(item.product_name),
                })
                .collect(),
            shipping_cost: self.shipping_cost.unwrap_or(Decimal::ZERO),
            discount_code_id: self.discount_code_id,
            payment_method: self
                .payment_method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            claimed: ClaimedTotals { subtotal: self.subtotal, discount: self.discount_amount, total: self.total_amount },
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CouponPayload {
    pub code: Option<String>,
    pub subtotal: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct TrackingParams {
    pub numero: Option<String>,
}

/// The configured payment gateway. Rejects with 500 before the body is
/// read when payments are not configured.
pub struct Gateway(pub Arc<dyn PaymentGateway>);

#[axum::async_trait]
impl FromRequestParts<AppState> for Gateway {
    type Rejection = ApiError;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.gateway.clone().map(Gateway).ok_or(ApiError::Internal("Mercado Pago não configurado"))
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn find_customer(State(s): State<AppState>, Path(cpf): Path<String>) -> Result<Json<Value>, ApiError> {
    let Some(cpf) = Cpf::normalize(&cpf) else {
        return Ok(Json(json!({ "found": false })));
    };
    Ok(Json(match customers::find_by_cpf(&s.db, &cpf).await? {
        Some(profile) => json!({ "found": true, "customer": CustomerSummary::from(profile) }),
        None => json!({ "found": false }),
    }))
}

async fn validate_coupon(
    State(s): State<AppState>,
    ValidatedJson(p): ValidatedJson<CouponPayload>,
) -> Result<Json<Value>, ApiError> {
    let discount = coupons::validate(&s.db, p.code.as_deref(), p.subtotal).await?;
    Ok(Json(json!({ "success": true, "discount": discount })))
}

async fn create_order(
    State(s): State<AppState>,
    ValidatedJson(p): ValidatedJson<CheckoutPayload>,
) -> Result<Json<Value>, ApiError> {
    let mut order = checkout::place_order(&s.db, p.into_request()?).await?;
    s.publish(order.take_events()).await;
    Ok(Json(json!({ "success": true, "orderNumber": order.order_number, "orderId": order.id })))
}

async fn create_preference(
    Gateway(gateway): Gateway,
    State(s): State<AppState>,
    ValidatedJson(p): ValidatedJson<CheckoutPayload>,
) -> Result<Json<Value>, ApiError> {
    let request = p.into_request()?;
    let items: Vec<SessionItem> = request
        .lines
        .iter()
        .map(|line| SessionItem {
            id: line.product_id.to_string(),
            title: line.title.clone().unwrap_or_else(|| "Produto".to_string()),
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
        .collect();

    let mut order = checkout::place_order(&s.db, request).await?;
    s.publish(order.take_events()).await;

    let session_request = SessionRequest { order_number: order.order_number.clone(), items };
    let session = gateway.create_payment_session(&session_request).await.map_err(|e| {
        tracing::error!(order_number = %order.order_number, error = %e, "payment session could not be created");
        ApiError::Internal("Erro ao iniciar pagamento")
    })?;

    Ok(Json(json!({
        "success": true,
        "orderNumber": order.order_number,
        "preferenceId": session.id,
        "initPoint": session.redirect_url,
    })))
}

async fn find_order(State(s): State<AppState>, Query(p): Query<TrackingParams>) -> Result<Json<Value>, ApiError> {
    let number = p
        .numero
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Número do pedido é obrigatório".into()))?;
    let mut detail = orders::get_order(&s.db, &OrderKey::Number(number)).await?;
    detail.customer_profile = None;
    Ok(Json(json!({ "success": true, "order": detail })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(body: Value) -> CheckoutPayload { serde_json::from_value(body).unwrap() }

    #[test]
    fn test_checkout_payload_conversion() {
        let p = payload(json!({
            "customer": { "name": "Ana", "email": "ana@example.com", "cpf": "123.456.789-09", "phone": "" },
            "items": [{ "productId": 4, "quantity": 2, "unitPrice": 89.9, "productName": "Creatina" }],
            "subtotal": 179.8,
            "totalAmount": 1.0,
            "shippingCost": 15
        }));
        assert!(p.validate().is_ok());
        let request = p.into_request().unwrap();
        assert_eq!(request.customer.cpf.unwrap().as_str(), "12345678909");
        assert!(request.customer.phone.is_none());
        assert_eq!(request.lines[0].title.as_deref(), Some("Creatina"));
        assert_eq!(request.lines[0].unit_price, Decimal::new(899, 1));
        assert_eq!(request.shipping_cost, Decimal::new(15, 0));
        assert_eq!(request.payment_method, DEFAULT_PAYMENT_METHOD);
        assert_eq!(request.claimed.total, Some(Decimal::ONE));
    }

    #[test]
    fn test_checkout_payload_rejections() {
        let p = payload(json!({ "items": [{ "productId": 1, "quantity": 1, "unitPrice": 10 }] }));
        assert!(p.into_request().is_err());

        let p = payload(json!({ "customer": { "name": "Ana", "email": "ana@example.com" }, "items": [] }));
        assert!(p.validate().is_ok());
        assert!(p.into_request().is_err());

        let p = payload(json!({
            "customer": { "name": "Ana", "email": "not-an-email" },
            "items": [{ "productId": 1, "quantity": 1, "unitPrice": 10 }]
        }));
        assert!(p.into_request().is_err());

        let p = payload(json!({
            "customer": { "name": "Ana", "email": "ana@example.com" },
            "items": [{ "productId": 1, "quantity": 0, "unitPrice": 10 }]
        }));
        assert!(p.into_request().is_err());
    }

    #[test]
    fn test_line_bounds() {
        let line = |quantity: i64, price: f64| -> OrderLinePayload {
            serde_json::from_value(json!({ "productId": 1, "quantity": quantity, "unitPrice": price })).unwrap()
        };
        assert!(line(10_000, 9_999_999_999.0).validate().is_ok());
        assert!(line(10_001, 10.0).validate().is_err());
        assert!(line(1000, 1e28).validate().is_err());
        assert!(line(1, -0.01).validate().is_err());
    }
}
