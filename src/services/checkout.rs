//! Order placement.
//!
//! Totals are recomputed from the submitted lines and the referenced
//! discount code; whatever totals the client sent are only compared and
//! logged. Coupon consumption, the order row, its items and the customer
//! profile are written in one transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::domain::aggregates::{CouponRejection, DiscountCode, NewOrderLine, Order};
use crate::domain::value_objects::{round_money, Cpf, OrderNumber, MAX_MONEY};
use crate::{Result, StoreError};

const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cpf: Option<Cpf>,
    pub address: Option<String>,
}

/// Totals as the storefront computed them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClaimedTotals {
    pub subtotal: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub total: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutRequest {
    pub customer: CheckoutCustomer,
    pub lines: Vec<NewOrderLine>,
    pub shipping_cost: Decimal,
    pub discount_code_id: Option<i32>,
    pub payment_method: String,
    pub claimed: ClaimedTotals,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Subtotal from the lines, discount from the coupon (clamped to the
/// subtotal), total = subtotal − discount + shipping. `None` when any amount
/// overflows or the total does not fit the money columns.
pub fn compute_totals(lines: &[NewOrderLine], coupon: Option<&DiscountCode>, shipping: Decimal) -> Option<OrderTotals> {
    let subtotal = lines.iter().try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.subtotal()?))?;
    let subtotal = round_money(subtotal);
    let discount = coupon.map_or(Decimal::ZERO, |c| c.amount_for(subtotal));
    let shipping = round_money(shipping.max(Decimal::ZERO));
    let total = (subtotal - discount).checked_add(shipping)?;
    (subtotal <= MAX_MONEY && total <= MAX_MONEY).then_some(OrderTotals { subtotal, discount, shipping, total })
}

fn invalid_data() -> StoreError { StoreError::Validation("Dados inválidos".into()) }

impl OrderTotals {
    fn disagrees_with(&self, claimed: &ClaimedTotals) -> bool {
        let differs = |claimed: Option<Decimal>, actual: Decimal| claimed.is_some_and(|c| round_money(c) != actual);
        differs(claimed.subtotal, self.subtotal) || differs(claimed.discount, self.discount) || differs(claimed.total, self.total)
    }
}

fn check_lines(lines: &[NewOrderLine], shipping: Decimal) -> Result<()> {
    if lines.is_empty() || lines.iter().any(|l| l.quantity <= 0 || l.unit_price < Decimal::ZERO) {
        return Err(invalid_data());
    }
    compute_totals(lines, None, shipping).map(|_| ()).ok_or_else(invalid_data)
}

/// Places a `pending` order. The returned order carries its `Created` event.
pub async fn place_order(pool: &PgPool, request: CheckoutRequest) -> Result<Order> {
    check_lines(&request.lines, request.shipping_cost)?;

    let mut tx = pool.begin().await?;

    let mut product_ids: Vec<i32> = request.lines.iter().map(|l| l.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let (known,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE id = ANY($1)")
        .bind(&product_ids)
        .fetch_one(&mut *tx)
        .await?;
    if known != product_ids.len() as i64 {
        return Err(StoreError::ProductNotFound);
    }

    let coupon = match request.discount_code_id {
        Some(id) => Some(consume_coupon(&mut tx, id, &request.lines).await?),
        None => None,
    };

    let totals = compute_totals(&request.lines, coupon.as_ref(), request.shipping_cost).ok_or_else(invalid_data)?;
    if totals.disagrees_with(&request.claimed) {
        tracing::warn!(
            claimed = ?request.claimed,
            subtotal = %totals.subtotal,
            discount = %totals.discount,
            total = %totals.total,
            "client totals differ from recomputed totals"
        );
    }

    let mut order = insert_order(&mut tx, &request, &totals).await?;

    for line in &request.lines {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, subtotal) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.subtotal().ok_or_else(invalid_data)?)
        .execute(&mut *tx)
        .await?;
    }

    let customer = &request.customer;
    if let Some(cpf) = &customer.cpf {
        super::customers::upsert(&mut tx, cpf, &customer.name, &customer.email, customer.phone.as_deref().unwrap_or_default())
            .await?;
    }

    tx.commit().await?;

    tracing::info!(order_id = order.id, order_number = %order.order_number, total = %order.total_amount, "order placed");
    order.record_created();
    Ok(order)
}

/// Locks the coupon, re-checks it against the order and takes one use.
async fn consume_coupon(conn: &mut PgConnection, id: i32, lines: &[NewOrderLine]) -> Result<DiscountCode> {
    let coupon = sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CouponRejection::NotFound)?;

    let subtotal = compute_totals(lines, None, Decimal::ZERO).ok_or_else(invalid_data)?.subtotal;
    coupon.apply(subtotal, Utc::now())?;

    let consumed = sqlx::query(
        "UPDATE discount_codes SET uses_count = uses_count + 1, updated_at = NOW()
         WHERE id = $1 AND (unlimited_uses OR max_uses IS NULL OR uses_count < max_uses)",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if consumed.rows_affected() == 0 {
        return Err(CouponRejection::UsageExhausted.into());
    }
    Ok(coupon)
}

async fn insert_order(conn: &mut PgConnection, request: &CheckoutRequest, totals: &OrderTotals) -> Result<Order> {
    let customer = &request.customer;
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let number = OrderNumber::generate();
        let inserted = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (order_number, customer_cpf, customer_name, customer_email, customer_phone,
                                 customer_address, subtotal, discount_amount, shipping_cost, total_amount,
                                 payment_method, status, discount_code_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12)
             ON CONFLICT (order_number) DO NOTHING
             RETURNING *",
        )
        .bind(number.as_str())
        .bind(customer.cpf.as_ref().map(Cpf::as_str))
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.shipping)
        .bind(totals.total)
        .bind(&request.payment_method)
        .bind(request.discount_code_id)
        .fetch_optional(&mut *conn)
        .await?;
        match inserted {
            Some(order) => return Ok(order),
            None => tracing::warn!(order_number = %number, "order number collision, retrying"),
        }
    }
    Err(StoreError::OrderNumberCollision)
}
