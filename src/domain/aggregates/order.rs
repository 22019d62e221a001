//! Order Aggregate
//!
//! Status changes are free-form (any status may follow any other) with one
//! guarded side effect: entering `paid` from any other status decrements the
//! stock channel of every line item. The decrement is planned in full against
//! a [`StockBook`] before anything is mutated, so a failing line leaves both
//! the book and the order untouched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::aggregates::product::{StockChannel, StockType};
use crate::domain::events::{DomainEvent, OrderEvent, ProductEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending, Self::Paid, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// `None` when `requested` equals the current status (idempotent no-op).
    pub fn transition_to(self, requested: OrderStatus) -> Option<Transition> {
        if self == requested {
            return None;
        }
        let mut side_effects = Vec::new();
        if requested == Self::Paid {
            side_effects.push(SideEffect::DecrementStock);
        }
        Some(Transition { from: self, to: requested, side_effects })
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|status| status.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = OrderError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub side_effects: Vec<SideEffect>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffect { DecrementStock }

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i32,
    pub order_number: String,
    pub customer_cpf: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub payment_method: String,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub discount_code_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    /// Price frozen at purchase time.
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// A line submitted at checkout, before it is persisted as an [`OrderItem`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub title: Option<String>,
}

impl NewOrderLine {
    /// `None` when the line total does not fit a `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> { self.unit_price.checked_mul(Decimal::from(self.quantity)) }
}

/// Stock counters of one product as read inside the transition transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockLevel {
    pub stock_type: StockType,
    pub available: i32,
    pub distributor: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: i32,
    pub channel: StockChannel,
    pub quantity: i32,
}

/// Stock levels keyed by product id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StockBook(HashMap<i32, StockLevel>);

impl StockBook {
    pub fn insert(&mut self, product_id: i32, level: StockLevel) { self.0.insert(product_id, level); }
    pub fn get(&self, product_id: i32) -> Option<&StockLevel> { self.0.get(&product_id) }

    /// Checks every item in order against a working copy of the book. Items
    /// sharing a product draw from the same running balance.
    pub fn plan(&self, items: &[OrderItem]) -> Result<Vec<StockDecrement>, TransitionError> {
        let mut working = self.0.clone();
        let mut plan = Vec::with_capacity(items.len());
        for item in items {
            let level = working.get_mut(&item.product_id).ok_or(TransitionError::MissingProduct(item.product_id))?;
            let Some(channel) = level.stock_type.channel() else {
                return Err(TransitionError::OutOfStock { product_id: item.product_id });
            };
            let counter = match channel {
                StockChannel::Available => &mut level.available,
                StockChannel::Distributor => &mut level.distributor,
            };
            if *counter < item.quantity {
                return Err(match channel {
                    StockChannel::Available => TransitionError::InsufficientStock { product_id: item.product_id },
                    StockChannel::Distributor => TransitionError::InsufficientStockDistributor { product_id: item.product_id },
                });
            }
            *counter -= item.quantity;
            plan.push(StockDecrement { product_id: item.product_id, channel, quantity: item.quantity });
        }
        Ok(plan)
    }

    fn apply(&mut self, plan: &[StockDecrement]) {
        for d in plan {
            if let Some(level) = self.0.get_mut(&d.product_id) {
                match d.channel {
                    StockChannel::Available => level.available -= d.quantity,
                    StockChannel::Distributor => level.distributor -= d.quantity,
                }
            }
        }
    }
}

/// Outcome of a status change that actually moved the order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub decrements: Vec<StockDecrement>,
}

impl Order {
    /// Applies `requested` to the order. Returns `Ok(None)` for a no-op.
    /// On error neither `self` nor `stock` has been modified.
    pub fn change_status(
        &mut self,
        requested: OrderStatus,
        items: &[OrderItem],
        stock: &mut StockBook,
    ) -> Result<Option<StatusChange>, TransitionError> {
        let Some(transition) = self.status.transition_to(requested) else { return Ok(None) };

        let mut decrements = Vec::new();
        for effect in &transition.side_effects {
            match effect {
                SideEffect::DecrementStock => decrements = stock.plan(items)?,
            }
        }
        stock.apply(&decrements);

        self.status = transition.to;
        self.updated_at = Utc::now();
        for d in &decrements {
            self.raise_event(DomainEvent::Product(ProductEvent::StockDecremented {
                product_id: d.product_id, channel: d.channel, quantity: d.quantity,
            }));
        }
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_number: self.order_number.clone(), from: transition.from, to: transition.to,
        }));
        Ok(Some(StatusChange { from: transition.from, to: transition.to, decrements }))
    }

    pub fn record_created(&mut self) {
        self.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_number: self.order_number.clone(), total: self.total_amount,
        }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Status inválido: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Pedido não encontrado")]
    NotFound,
    #[error("Produto sem estoque")]
    OutOfStock { product_id: i32 },
    #[error("Estoque insuficiente para baixa")]
    InsufficientStock { product_id: i32 },
    #[error("Estoque do distribuidor insuficiente")]
    InsufficientStockDistributor { product_id: i32 },
    #[error("Produto {0} do pedido não existe mais")]
    MissingProduct(i32),
}
