//! Discount code aggregate and the checks a code must pass before it applies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::value_objects::{format_brl, round_money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType { Percentage, Fixed }

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
}

impl FromStr for DiscountType {
    type Err = CouponRejection;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            _ => Err(CouponRejection::InvalidInput),
        }
    }
}

impl TryFrom<String> for DiscountType {
    type Error = CouponRejection;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: i32,
    pub code: String,
    pub partner_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub max_uses: Option<i32>,
    pub unlimited_uses: bool,
    pub uses_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A discount that passed every check, priced against a subtotal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedDiscount {
    pub id: i32,
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub amount: Decimal,
}

impl DiscountCode {
    /// A code without a usage cap (either flagged unlimited or with no
    /// `max_uses` recorded) is never exhausted.
    pub fn is_exhausted(&self) -> bool {
        match (self.unlimited_uses, self.max_uses) {
            (false, Some(max)) => self.uses_count >= max,
            _ => false,
        }
    }

    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_from && now <= self.valid_until
    }

    /// Runs the validation steps in order and prices the discount. Never
    /// touches `uses_count`.
    pub fn apply(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<AppliedDiscount, CouponRejection> {
        if !self.active { return Err(CouponRejection::Inactive); }
        if !self.is_within_window(now) { return Err(CouponRejection::OutOfWindow); }
        if self.is_exhausted() { return Err(CouponRejection::UsageExhausted); }
        if subtotal < self.min_purchase { return Err(CouponRejection::BelowMinimum { minimum: self.min_purchase }); }
        Ok(AppliedDiscount {
            id: self.id,
            code: self.code.clone(),
            discount_type: self.discount_type,
            value: self.discount_value,
            amount: self.amount_for(subtotal),
        })
    }

    pub fn amount_for(&self, subtotal: Decimal) -> Decimal {
        discount_amount(self.discount_type, self.discount_value, subtotal)
    }
}

/// Discount for `subtotal`, clamped to `[0, subtotal]`.
pub fn discount_amount(discount_type: DiscountType, value: Decimal, subtotal: Decimal) -> Decimal {
    let raw = match discount_type {
        // 100% or more takes the whole subtotal.
        DiscountType::Percentage => {
            let rate = value / Decimal::ONE_HUNDRED;
            if rate >= Decimal::ONE {
                subtotal
            } else {
                subtotal.checked_mul(rate).map_or(subtotal, round_money)
            }
        }
        DiscountType::Fixed => value,
    };
    raw.min(subtotal).max(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Código e subtotal são obrigatórios")]
    InvalidInput,
    #[error("Cupom inválido")]
    NotFound,
    #[error("Este cupom não está mais ativo")]
    Inactive,
    #[error("Este cupom não está dentro do período de validade")]
    OutOfWindow,
    #[error("Este cupom atingiu o limite de uso")]
    UsageExhausted,
    #[error("Compra mínima de {} necessária", brl(.minimum))]
    BelowMinimum { minimum: Decimal },
}

fn brl(amount: &Decimal) -> String { format_brl(*amount) }
