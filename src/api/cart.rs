//! Server-side carts keyed by an anonymous session id.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use super::extract::ValidatedJson;
use super::AppState;
use crate::domain::aggregates::{Cart, CartItem, NewOrderLine};
use crate::services::catalog;
use crate::StoreError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/carrinho", post(open_cart))
        .route("/carrinho/:session", get(get_cart).put(replace_cart).delete(clear_cart))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub session_id: Uuid,
    pub items: Vec<CartItem>,
    pub total: Decimal,
    pub items_count: i64,
    /// Lines ready to submit as checkout `items`.
    pub checkout_items: Vec<NewOrderLine>,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            session_id: cart.session_id(),
            items: cart.items().to_vec(),
            total: cart.total(),
            items_count: cart.items_count(),
            checkout_items: cart.checkout_lines(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: i32,
    #[validate(range(min = 0, max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CartForm {
    #[serde(default)]
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedCart {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

async fn open_cart() -> (StatusCode, Json<OpenedCart>) {
    (StatusCode::CREATED, Json(OpenedCart { session_id: Uuid::new_v4(), created_at: Utc::now() }))
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<Uuid>) -> Result<Json<CartView>, ApiError> {
    let cart = s.carts.load(session).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Replaces the cart contents, pricing each line from the catalog. A
/// quantity of zero drops the line.
async fn replace_cart(
    State(s): State<AppState>,
    Path(session): Path<Uuid>,
    ValidatedJson(form): ValidatedJson<CartForm>,
) -> Result<Json<CartView>, ApiError> {
    for line in &form.items {
        line.validate()?;
    }
    let ids: Vec<i32> = form.items.iter().map(|l| l.product_id).collect();
    let products: HashMap<i32, _> =
        catalog::products_by_ids(&s.db, &ids).await?.into_iter().map(|p| (p.id, p)).collect();

    let mut cart = Cart::new(session);
    for line in form.items.iter().filter(|l| l.quantity > 0) {
        let product = products.get(&line.product_id).ok_or(StoreError::ProductNotFound)?;
        cart.add_item(CartItem {
            product_id: product.id,
            product_name: product.name.clone(),
            brand: product.brand.clone(),
            image_url: product.image_url.clone(),
            price: product.price,
            quantity: line.quantity,
        })
        .map_err(StoreError::from)?;
    }
    s.carts.save(&cart).await?;
    Ok(Json(CartView::from(&cart)))
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<Uuid>) -> Result<StatusCode, ApiError> {
    s.carts.clear(session).await?;
    Ok(StatusCode::NO_CONTENT)
}
