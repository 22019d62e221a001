//! Discount code lookup, validation and back-office maintenance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::aggregates::{AppliedDiscount, CouponRejection, DiscountCode, DiscountType};
use crate::domain::value_objects::{CouponCode, MAX_MONEY};
use crate::{Result, StoreError};

/// Checks a code against a subtotal. Read-only: usage is only consumed when
/// an order is placed.
pub async fn validate(pool: &PgPool, code: Option<&str>, subtotal: Option<Decimal>) -> Result<AppliedDiscount> {
    let (code, subtotal) = required_input(code, subtotal)?;
    let coupon = find_by_code(pool, &code).await?.ok_or(CouponRejection::NotFound)?;
    Ok(coupon.apply(subtotal, Utc::now())?)
}

fn required_input(code: Option<&str>, subtotal: Option<Decimal>) -> std::result::Result<(CouponCode, Decimal), CouponRejection> {
    let code = code.and_then(|c| CouponCode::new(c).ok()).ok_or(CouponRejection::InvalidInput)?;
    let subtotal = subtotal.filter(|s| *s > Decimal::ZERO && *s <= MAX_MONEY).ok_or(CouponRejection::InvalidInput)?;
    Ok((code, subtotal))
}

pub async fn find_by_code(pool: &PgPool, code: &CouponCode) -> Result<Option<DiscountCode>> {
    let coupon = sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE code = $1")
        .bind(code.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(coupon)
}

pub async fn list(pool: &PgPool) -> Result<Vec<DiscountCode>> {
    let coupons = sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(coupons)
}

#[derive(Clone, Debug, PartialEq)]
pub struct CouponDraft {
    pub code: CouponCode,
    pub partner_name: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub max_uses: Option<i32>,
    pub unlimited_uses: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub active: bool,
}

impl CouponDraft {
    /// Unlimited codes carry no cap.
    pub fn stored_max_uses(&self) -> Option<i32> {
        if self.unlimited_uses { None } else { self.max_uses }
    }
}

async fn code_taken(pool: &PgPool, code: &CouponCode, except: Option<i32>) -> Result<bool> {
    let (taken,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM discount_codes WHERE code = $1 AND ($2::INTEGER IS NULL OR id <> $2))",
    )
    .bind(code.as_str())
    .bind(except)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn create(pool: &PgPool, draft: CouponDraft) -> Result<DiscountCode> {
    if code_taken(pool, &draft.code, None).await? {
        return Err(StoreError::DuplicateCouponCode);
    }
    let coupon = sqlx::query_as::<_, DiscountCode>(
        "INSERT INTO discount_codes (code, partner_name, discount_type, discount_value, min_purchase, max_uses,
                                     unlimited_uses, valid_from, valid_until, active)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *",
    )
    .bind(draft.code.as_str())
    .bind(&draft.partner_name)
    .bind(draft.discount_type.as_str())
    .bind(draft.discount_value)
    .bind(draft.min_purchase)
    .bind(draft.stored_max_uses())
    .bind(draft.unlimited_uses)
    .bind(draft.valid_from)
    .bind(draft.valid_until)
    .bind(draft.active)
    .fetch_one(pool)
    .await?;
    tracing::info!(coupon_id = coupon.id, code = %coupon.code, "coupon created");
    Ok(coupon)
}

pub async fn update(pool: &PgPool, id: i32, draft: CouponDraft) -> Result<DiscountCode> {
    if code_taken(pool, &draft.code, Some(id)).await? {
        return Err(StoreError::DuplicateCouponCode);
    }
    sqlx::query_as::<_, DiscountCode>(
        "UPDATE discount_codes SET
             code = $2, partner_name = $3, discount_type = $4, discount_value = $5, min_purchase = $6,
             max_uses = $7, unlimited_uses = $8, valid_from = $9, valid_until = $10, active = $11,
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(draft.code.as_str())
    .bind(&draft.partner_name)
    .bind(draft.discount_type.as_str())
    .bind(draft.discount_value)
    .bind(draft.min_purchase)
    .bind(draft.stored_max_uses())
    .bind(draft.unlimited_uses)
    .bind(draft.valid_from)
    .bind(draft.valid_until)
    .bind(draft.active)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::CouponNotFound)
}

pub async fn delete(pool: &PgPool, id: i32) -> Result<()> {
    let result = sqlx::query("DELETE FROM discount_codes WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::CouponNotFound);
    }
    Ok(())
}
