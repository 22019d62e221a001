//! Back-office endpoints. Every handler takes [`AdminSession`] first.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::auth::{login, AdminSession};
use super::error::ApiError;
use super::extract::{margin, money, ValidatedJson};
use super::AppState;
use crate::domain::aggregates::{DiscountCode, DiscountType, OrderStatus, Product, StockType};
use crate::domain::value_objects::{group_code, CouponCode};
use crate::services::catalog::{self, DistributorRow, ImportSummary, ProductDraft, StockIntake};
use crate::services::coupons::{self, CouponDraft};
use crate::services::orders::{self, OrderDetail, OrderKey};
use crate::StoreError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/produtos", get(list_products).post(create_product))
        .route("/admin/produtos/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/admin/produtos/codigos-grupo", post(assign_group_codes))
        .route("/admin/estoque", post(receive_stock))
        .route("/admin/importacao", post(import_distributor))
        .route("/admin/cupons", get(list_coupons).post(create_coupon))
        .route("/admin/cupons/:id", put(update_coupon).delete(delete_coupon))
        .route("/admin/pedidos", get(list_orders))
        .route("/admin/pedidos/:id", get(get_order).patch(change_order_status))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListParams {
    pub needs_attention: Option<bool>,
    #[serde(default)]
    pub count_only: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    #[validate(length(min = 1, max = 300))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub group_code: Option<String>,
    pub sku: Option<String>,
    #[validate(custom = "money")]
    pub cost_price: Option<Decimal>,
    #[validate(custom = "margin")]
    pub margin_percentage: Option<Decimal>,
    #[validate(custom = "money")]
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub supplier_url: Option<String>,
    pub stock_type: Option<String>,
    pub stock_available: Option<i32>,
    pub stock_distributor: Option<i32>,
}

impl ProductForm {
    fn into_draft(self) -> Result<ProductDraft, StoreError> {
        let stock_type = match self.stock_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse()?,
            None => StockType::default(),
        };
        let name = self.name.trim().to_string();
        let group_code = self
            .group_code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .or_else(|| group_code(&name));
        Ok(ProductDraft {
            name,
            description: self.description,
            category: self.category,
            brand: self.brand,
            group_code,
            sku: self.sku,
            cost_price: self.cost_price,
            margin_percentage: self.margin_percentage,
            price: self.price,
            image_url: self.image_url,
            supplier_url: self.supplier_url,
            stock_type,
            stock_available: self.stock_available,
            stock_distributor: self.stock_distributor,
        })
    }
}

async fn list_products(
    _session: AdminSession,
    State(s): State<AppState>,
    Query(p): Query<ProductListParams>,
) -> Result<Response, ApiError> {
    if p.count_only {
        let count = catalog::admin_count(&s.db, p.needs_attention).await?;
        return Ok(Json(json!({ "count": count })).into_response());
    }
    Ok(Json(catalog::admin_list(&s.db, p.needs_attention).await?).into_response())
}

async fn get_product(
    _session: AdminSession,
    State(s): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(catalog::get_product(&s.db, id).await?))
}

async fn create_product(
    _session: AdminSession,
    State(s): State<AppState>,
    ValidatedJson(form): ValidatedJson<ProductForm>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = catalog::create_product(&s.db, form.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    _session: AdminSession,
    State(s): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(form): ValidatedJson<ProductForm>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(catalog::update_product(&s.db, id, form.into_draft()?).await?))
}

async fn delete_product(
    _session: AdminSession,
    State(s): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    catalog::delete_product(&s.db, id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StockForm {
    pub product_id: Option<i32>,
    #[validate(custom = "money")]
    pub cost_price: Option<Decimal>,
    #[validate(custom = "margin")]
    pub margin_percentage: Option<Decimal>,
    pub stock_available: Option<i32>,
    pub image_url: Option<String>,
}

async fn receive_stock(
    _session: AdminSession,
    State(s): State<AppState>,
    ValidatedJson(form): ValidatedJson<StockForm>,
) -> Result<Json<Value>, ApiError> {
    let product_id = form.product_id.ok_or_else(|| ApiError::BadRequest("Produto é obrigatório".into()))?;
    let intake = StockIntake {
        product_id,
        cost_price: form.cost_price,
        margin_percentage: form.margin_percentage,
        stock_available: form.stock_available.unwrap_or(0),
        image_url: form.image_url.filter(|u| !u.trim().is_empty()),
    };
    let product = catalog::receive_stock(&s.db, intake).await?;
    tracing::info!(product_id = product.id, stock_available = product.stock_available, price = %product.price, "stock received");
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupCodeParams {
    #[serde(default)]
    pub force: bool,
}

async fn assign_group_codes(
    _session: AdminSession,
    State(s): State<AppState>,
    Query(p): Query<GroupCodeParams>,
) -> Result<Json<Value>, ApiError> {
    let updated = catalog::assign_group_codes(&s.db, p.force).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

/// One spreadsheet row. Column headers of the distributor export are
/// accepted as aliases.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributorLine {
    #[serde(alias = "Código")]
    pub code: Option<String>,
    #[serde(alias = "Descrição")]
    pub description: Option<String>,
    #[serde(alias = "Marca")]
    pub brand: Option<String>,
    #[serde(alias = "Categoria do produto")]
    pub category: Option<String>,
    #[serde(alias = "Estoque")]
    pub stock: Option<Decimal>,
    #[serde(alias = "URL Imagens Externas")]
    pub image_urls: Option<String>,
    #[serde(alias = "Link Externo")]
    pub supplier_url: Option<String>,
}

impl From<DistributorLine> for DistributorRow {
    fn from(line: DistributorLine) -> Self {
        Self {
            code: line.code,
            description: line.description,
            brand: line.brand,
            category: line.category,
            stock: line.stock,
            image_urls: line.image_urls,
            supplier_url: line.supplier_url,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportForm {
    #[serde(default)]
    pub items: Vec<DistributorLine>,
}

async fn import_distributor(
    _session: AdminSession,
    State(s): State<AppState>,
    ValidatedJson(form): ValidatedJson<ImportForm>,
) -> Result<Json<ImportSummary>, ApiError> {
    if form.items.is_empty() {
        return Err(ApiError::BadRequest("Nenhum item para importar".into()));
    }
    let rows = form.items.into_iter().map(DistributorRow::from).collect();
    Ok(Json(catalog::import_distributor(&s.db, rows).await?))
}

// =============================================================================
// Coupons
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CouponForm {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    pub partner_name: Option<String>,
    pub discount_type: String,
    #[validate(custom = "money")]
    pub discount_value: Decimal,
    #[validate(custom = "money")]
    pub min_purchase: Option<Decimal>,
    #[validate(range(min = 0))]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub unlimited_uses: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub active: Option<bool>,
}

impl CouponForm {
    fn into_draft(self) -> Result<CouponDraft, ApiError> {
        let code = CouponCode::new(self.code).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let discount_type: DiscountType =
            self.discount_type.parse().map_err(|_| ApiError::BadRequest("Tipo de desconto inválido".into()))?;
        if self.valid_until < self.valid_from {
            return Err(ApiError::BadRequest("Período de validade inválido".into()));
        }
        Ok(CouponDraft {
            code,
            partner_name: self.partner_name.filter(|p| !p.trim().is_empty()),
            discount_type,
            discount_value: self.discount_value,
            min_purchase: self.min_purchase.unwrap_or(Decimal::ZERO),
            max_uses: self.max_uses,
            unlimited_uses: self.unlimited_uses,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            active: self.active.unwrap_or(true),
        })
    }
}

async fn list_coupons(_session: AdminSession, State(s): State<AppState>) -> Result<Json<Vec<DiscountCode>>, ApiError> {
    Ok(Json(coupons::list(&s.db).await?))
}

async fn create_coupon(
    _session: AdminSession,
    State(s): State<AppState>,
    ValidatedJson(form): ValidatedJson<CouponForm>,
) -> Result<(StatusCode, Json<DiscountCode>), ApiError> {
    let coupon = coupons::create(&s.db, form.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

async fn update_coupon(
    _session: AdminSession,
    State(s): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(form): ValidatedJson<CouponForm>,
) -> Result<Json<DiscountCode>, ApiError> {
    Ok(Json(coupons::update(&s.db, id, form.into_draft()?).await?))
}

async fn delete_coupon(
    _session: AdminSession,
    State(s): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    coupons::delete(&s.db, id).await?;
    Ok(Json(json!({ "success": true })))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct StatusForm {
    pub status: Option<String>,
}

impl StatusForm {
    fn status(&self) -> Result<OrderStatus, ApiError> {
        self.status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ApiError::BadRequest("Status inválido".into()))
    }
}

async fn list_orders(_session: AdminSession, State(s): State<AppState>) -> Result<Json<Vec<OrderDetail>>, ApiError> {
    Ok(Json(orders::list_orders(&s.db).await?))
}

async fn get_order(
    _session: AdminSession,
    State(s): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>, ApiError> {
    Ok(Json(orders::get_order(&s.db, &OrderKey::Id(id)).await?))
}

async fn change_order_status(
    session: AdminSession,
    State(s): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(form): ValidatedJson<StatusForm>,
) -> Result<Json<OrderDetail>, ApiError> {
    let requested = form.status()?;
    let key = OrderKey::Id(id);
    let (mut order, change) = orders::apply_status_change(&s.db, &key, requested).await?;
    if change.is_some() {
        tracing::info!(order_id = id, to = %requested, admin = %session.email, "status changed from back-office");
        s.publish(order.take_events()).await;
    }
    Ok(Json(orders::get_order(&s.db, &key).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ProductError;

    fn coupon_form(body: Value) -> CouponForm { serde_json::from_value(body).unwrap() }

    #[test]
    fn test_coupon_form_defaults() {
        let draft = coupon_form(json!({
            "code": " parceiro10 ",
            "discountType": "percentage",
            "discountValue": 10,
            "unlimitedUses": true,
            "maxUses": 3,
            "validFrom": "2024-01-01T00:00:00Z",
            "validUntil": "2024-12-31T23:59:59Z"
        }))
        .into_draft()
        .unwrap();
        assert_eq!(draft.code.as_str(), "PARCEIRO10");
        assert!(draft.active);
        assert_eq!(draft.min_purchase, Decimal::ZERO);
        assert_eq!(draft.stored_max_uses(), None);
    }

    #[test]
    fn test_coupon_form_rejections() {
        let base = json!({
            "code": "X", "discountType": "bogus", "discountValue": 1,
            "validFrom": "2024-01-01T00:00:00Z", "validUntil": "2024-12-31T00:00:00Z"
        });
        assert!(coupon_form(base.clone()).into_draft().is_err());

        let mut reversed = base;
        reversed["discountType"] = json!("fixed");
        reversed["validUntil"] = json!("2023-01-01T00:00:00Z");
        assert!(coupon_form(reversed).into_draft().is_err());
    }

    #[test]
    fn test_product_form_stock_type() {
        let form: ProductForm = serde_json::from_value(json!({ "name": "Whey", "stockType": "sob_encomenda" })).unwrap();
        assert_eq!(form.into_draft().unwrap().stock_type, StockType::SobEncomenda);

        let form: ProductForm = serde_json::from_value(json!({ "name": "Whey" })).unwrap();
        assert_eq!(form.into_draft().unwrap().stock_type, StockType::ProntaEntrega);

        let form: ProductForm = serde_json::from_value(json!({ "name": "Whey", "stockType": "sempre" })).unwrap();
        assert!(matches!(form.into_draft(), Err(StoreError::Product(ProductError::UnknownStockType(_)))));
    }

    #[test]
    fn test_status_form() {
        let form = StatusForm { status: Some("shipped".into()) };
        assert_eq!(form.status().unwrap(), OrderStatus::Shipped);
        assert!(StatusForm { status: Some("lost".into()) }.status().is_err());
        assert!(StatusForm { status: None }.status().is_err());
    }

    #[test]
    fn test_product_form_derives_group_code() {
        let form: ProductForm = serde_json::from_value(json!({ "name": " Whey Protein 900g Baunilha " })).unwrap();
        assert_eq!(form.into_draft().unwrap().group_code.as_deref(), Some("WHEY_PROTEIN"));

        let form: ProductForm =
            serde_json::from_value(json!({ "name": "Whey Protein 900g", "groupCode": " whey_iso " })).unwrap();
        assert_eq!(form.into_draft().unwrap().group_code.as_deref(), Some("WHEY_ISO"));
    }

    #[test]
    fn test_import_form_accepts_sheet_headers() {
        let form: ImportForm = serde_json::from_value(json!({ "items": [
            { "Código": "7891", "Descrição": "Creatina 300g", "Estoque": 4, "Marca": "Max" },
            { "code": "7892", "description": "Glutamina 150g", "stock": 1.5, "imageUrls": "https://img/g.jpg" }
        ]}))
        .unwrap();
        let rows: Vec<DistributorRow> = form.items.into_iter().map(DistributorRow::from).collect();
        assert_eq!(rows[0].code.as_deref(), Some("7891"));
        assert_eq!(rows[0].stock, Some(Decimal::new(4, 0)));
        assert_eq!(rows[0].brand.as_deref(), Some("Max"));
        assert_eq!(rows[1].description.as_deref(), Some("Glutamina 150g"));
        assert_eq!(rows[1].image_urls.as_deref(), Some("https://img/g.jpg"));
    }
}
