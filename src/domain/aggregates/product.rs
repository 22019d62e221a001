//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::value_objects::round_money;

/// Which inventory channel fulfils a product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockType {
    /// Ready to ship from on-hand inventory (`stock_available`).
    #[default]
    ProntaEntrega,
    /// Back-order through the distributor (`stock_distributor`).
    SobEncomenda,
    /// Not for sale.
    SemEstoque,
}

impl StockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProntaEntrega => "pronta_entrega",
            Self::SobEncomenda => "sob_encomenda",
            Self::SemEstoque => "sem_estoque",
        }
    }

    /// Counter decremented when an order for this product is paid.
    pub fn channel(&self) -> Option<StockChannel> {
        match self {
            Self::ProntaEntrega => Some(StockChannel::Available),
            Self::SobEncomenda => Some(StockChannel::Distributor),
            Self::SemEstoque => None,
        }
    }
}

impl fmt::Display for StockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for StockType {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pronta_entrega" => Ok(Self::ProntaEntrega),
            "sob_encomenda" => Ok(Self::SobEncomenda),
            "sem_estoque" => Ok(Self::SemEstoque),
            other => Err(ProductError::UnknownStockType(other.to_string())),
        }
    }
}

impl TryFrom<String> for StockType {
    type Error = ProductError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockChannel { Available, Distributor }

impl StockChannel {
    pub fn column(&self) -> &'static str {
        match self { Self::Available => "stock_available", Self::Distributor => "stock_distributor" }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub group_code: Option<String>,
    pub sku: Option<String>,
    /// `None` means the product still needs pricing by an admin.
    pub cost_price: Option<Decimal>,
    pub margin_percentage: Option<Decimal>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub supplier_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub stock_type: StockType,
    pub stock_available: i32,
    pub stock_distributor: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Selling price: `cost × (1 + margin/100)` when both are known, otherwise the
/// admin-supplied absolute price (zero when absent).
pub fn derive_price(cost: Option<Decimal>, margin: Option<Decimal>, fallback: Option<Decimal>) -> Decimal {
    match (cost, margin) {
        (Some(cost), Some(margin)) => round_money(cost * (Decimal::ONE + margin / Decimal::ONE_HUNDRED)),
        _ => fallback.map(round_money).unwrap_or(Decimal::ZERO),
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProductError {
    #[error("Tipo de estoque inválido: {0}")]
    UnknownStockType(String),
    #[error("Custo e margem são obrigatórios")]
    MissingCostOrMargin,
    #[error("Quantidade em estoque inválida")]
    NegativeStock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_price_from_cost_and_margin() {
        assert_eq!(derive_price(Some(Decimal::new(100, 0)), Some(Decimal::new(35, 0)), None), Decimal::new(13500, 2));
        assert_eq!(derive_price(Some(Decimal::new(8990, 2)), Some(Decimal::new(10, 0)), Some(Decimal::ONE)), Decimal::new(9889, 2));
    }

    #[test]
    fn test_derive_price_falls_back() {
        assert_eq!(derive_price(Some(Decimal::new(100, 0)), None, Some(Decimal::new(4990, 2))), Decimal::new(4990, 2));
        assert_eq!(derive_price(None, None, None), Decimal::ZERO);
    }

    #[test]
    fn test_stock_type_round_trip_names() {
        for t in [StockType::ProntaEntrega, StockType::SobEncomenda, StockType::SemEstoque] {
            assert_eq!(t.as_str().parse::<StockType>().unwrap(), t);
        }
        assert!("esgotado".parse::<StockType>().is_err());
    }
}
