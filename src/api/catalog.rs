use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::error::ApiError;
use super::AppState;
use crate::domain::aggregates::Product;
use crate::services::catalog;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/produtos", get(list_products))
        .route("/produtos/destaques", get(featured_products))
        .route("/produtos/:id", get(get_product))
        .route("/categorias", get(list_categories))
}

#[derive(Debug, Deserialize)]
pub struct CatalogParams {
    pub categoria: Option<String>,
}

async fn list_products(
    State(s): State<AppState>,
    Query(p): Query<CatalogParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(catalog::list_products(&s.db, p.categoria.as_deref()).await?))
}

async fn featured_products(State(s): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(catalog::featured_products(&s.db).await?))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<i32>) -> Result<Json<Product>, ApiError> {
    Ok(Json(catalog::get_product(&s.db, id).await?))
}

async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(catalog::categories(&s.db).await?))
}
