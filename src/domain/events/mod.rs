//! Domain events
use crate::domain::aggregates::{OrderStatus, StockChannel};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockDecremented { .. }) => "storefront.product.stock_decremented",
            Self::Order(OrderEvent::Created { .. }) => "storefront.order.created",
            Self::Order(OrderEvent::StatusChanged { .. }) => "storefront.order.status_changed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockDecremented { product_id: i32, channel: StockChannel, quantity: i32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_number: String, total: Decimal },
    StatusChanged { order_number: String, from: OrderStatus, to: OrderStatus },
}
