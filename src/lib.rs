//! Titanium Storefront
//!
//! Storefront and back-office for a supplements retailer.
//!
//! ## Features
//! - Product catalog with ready-to-ship and back-order stock channels
//! - Cart, checkout and discount codes
//! - Order tracking and status management
//! - Mercado Pago payment sessions and webhooks

pub mod api;
pub mod config;
pub mod domain;
pub mod payments;
pub mod services;

use thiserror::Error;

use domain::aggregates::{CartError, CouponRejection, ProductError, TransitionError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Pedido não encontrado")]
    OrderNotFound,

    #[error("Produto não encontrado")]
    ProductNotFound,

    #[error("Cupom não encontrado")]
    CouponNotFound,

    #[error("Este código já existe")]
    DuplicateCouponCode,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("Não foi possível gerar um número de pedido único")]
    OrderNumberCollision,

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
