//! Payment gateway integration.
//!
//! The gateway is consumed through [`PaymentGateway`]: create a hosted
//! payment session for an order, and fetch the authoritative state of a
//! payment announced by a webhook.

pub mod mercadopago;
pub mod signature;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::OrderStatus;

pub use mercadopago::MercadoPagoClient;
pub use signature::{compute_signature, verify_webhook_signature, SignatureError};

/// One line shown on the hosted checkout page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionItem {
    pub id: String,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Order data the gateway needs to open a session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRequest {
    pub order_number: String,
    pub items: Vec<SessionItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentSession {
    pub id: String,
    /// Where the buyer is redirected to pay.
    pub redirect_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayPayment {
    pub status: String,
    /// The order number the session was opened with.
    pub external_reference: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway answered {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid payment id {0:?}")]
    InvalidPaymentId(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_session(&self, request: &SessionRequest) -> Result<PaymentSession, PaymentError>;
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, PaymentError>;
}

/// Gateway payment ids are numeric.
pub fn is_payment_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// Maps a gateway payment status onto an order status. Unknown values map to
/// `pending` so a notification is never dropped.
pub fn map_payment_status(status: &str) -> OrderStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "approved" => OrderStatus::Paid,
        "pending" | "in_process" | "in_mediation" => OrderStatus::Pending,
        "rejected" | "cancelled" | "refunded" | "charged_back" => OrderStatus::Cancelled,
        _ => OrderStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_payment_status("approved"), OrderStatus::Paid);
        assert_eq!(map_payment_status("APPROVED"), OrderStatus::Paid);
        for s in ["pending", "in_process", "In_Mediation"] {
            assert_eq!(map_payment_status(s), OrderStatus::Pending);
        }
        for s in ["rejected", "cancelled", "refunded", "charged_back"] {
            assert_eq!(map_payment_status(s), OrderStatus::Cancelled);
        }
        assert_eq!(map_payment_status("authorized"), OrderStatus::Pending);
        assert_eq!(map_payment_status(""), OrderStatus::Pending);
    }
}
