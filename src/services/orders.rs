//! Order status transitions and order reads.
//!
//! [`apply_status_change`] is the single entry point used by both the
//! back-office and the payment webhook. Inside one transaction it locks the
//! order row, then the product rows its items reference, lets the aggregate
//! decide, and writes the stock decrements and the new status with guarded
//! updates. Any failure drops the transaction, so nothing is written.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;

use crate::domain::aggregates::{
    CustomerProfile, DiscountCode, Order, OrderItem, OrderStatus, Product, SideEffect, StatusChange, StockBook,
    StockChannel, StockLevel, StockType, TransitionError,
};
use crate::{Result, StoreError};

/// How an order is addressed: the back-office uses the id, the gateway the
/// order number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderKey {
    Id(i32),
    Number(String),
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Number(number) => f.write_str(number),
        }
    }
}

#[derive(sqlx::FromRow)]
struct StockRow {
    id: i32,
    #[sqlx(try_from = "String")]
    stock_type: StockType,
    stock_available: i32,
    stock_distributor: i32,
}

/// Moves an order to `requested`. Returns the order as stored afterwards and
/// the change, or `None` when the order already had that status.
pub async fn apply_status_change(
    pool: &PgPool,
    key: &OrderKey,
    requested: OrderStatus,
) -> Result<(Order, Option<StatusChange>)> {
    let mut tx = pool.begin().await?;

    let mut order = lock_order(&mut tx, key).await?.ok_or(TransitionError::NotFound)?;
    let Some(transition) = order.status.transition_to(requested) else {
        return Ok((order, None));
    };

    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order.id)
        .fetch_all(&mut *tx)
        .await?;
    let mut stock = if transition.side_effects.contains(&SideEffect::DecrementStock) {
        lock_stock(&mut tx, &items).await?
    } else {
        StockBook::default()
    };

    let change = match order.change_status(requested, &items, &mut stock) {
        Ok(Some(change)) => change,
        Ok(None) => return Ok((order, None)),
        Err(err) => {
            tracing::warn!(order_id = order.id, to = %requested, error = %err, "status change refused");
            return Err(err.into());
        }
    };

    for d in &change.decrements {
        decrement(&mut tx, d.product_id, d.channel, d.quantity).await?;
        tracing::info!(order_id = order.id, product_id = d.product_id, channel = d.channel.column(), quantity = d.quantity, "stock decremented");
    }

    sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(order.id)
        .bind(change.to.as_str())
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(order_id = order.id, from = %change.from, to = %change.to, "order status changed");
    Ok((order, Some(change)))
}

async fn lock_order(conn: &mut PgConnection, key: &OrderKey) -> Result<Option<Order>> {
    let query = match key {
        OrderKey::Id(id) => sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE").bind(*id),
        OrderKey::Number(number) => {
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1 FOR UPDATE").bind(number.clone())
        }
    };
    Ok(query.fetch_optional(conn).await?)
}

/// Locks the referenced products in id order so concurrent transitions
/// cannot deadlock on each other.
async fn lock_stock(conn: &mut PgConnection, items: &[OrderItem]) -> Result<StockBook> {
    let ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
    let rows = sqlx::query_as::<_, StockRow>(
        "SELECT id, stock_type, stock_available, stock_distributor FROM products
         WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut book = StockBook::default();
    for row in rows {
        book.insert(row.id, StockLevel { stock_type: row.stock_type, available: row.stock_available, distributor: row.stock_distributor });
    }
    Ok(book)
}

async fn decrement(conn: &mut PgConnection, product_id: i32, channel: StockChannel, quantity: i32) -> Result<()> {
    let column = channel.column();
    let sql = format!(
        "UPDATE products SET {column} = {column} - $2, updated_at = NOW() WHERE id = $1 AND {column} >= $2"
    );
    let result = sqlx::query(&sql).bind(product_id).bind(quantity).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(match channel {
            StockChannel::Available => TransitionError::InsufficientStock { product_id },
            StockChannel::Distributor => TransitionError::InsufficientStockDistributor { product_id },
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDetail {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<Product>,
}

/// An order with everything the back-office and tracking page show.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemDetail>,
    pub customer_profile: Option<CustomerProfile>,
    pub discount_code: Option<DiscountCode>,
}

pub async fn list_orders(pool: &PgPool) -> Result<Vec<OrderDetail>> {
    let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY created_at DESC").fetch_all(pool).await?;
    load_details(pool, orders).await
}

pub async fn get_order(pool: &PgPool, key: &OrderKey) -> Result<OrderDetail> {
    let order = match key {
        OrderKey::Id(id) => sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(*id).fetch_optional(pool).await?,
        OrderKey::Number(number) => {
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1")
                .bind(number)
                .fetch_optional(pool)
                .await?
        }
    };
    let order = order.ok_or(StoreError::OrderNotFound)?;
    load_details(pool, vec![order]).await?.pop().ok_or(StoreError::OrderNotFound)
}

async fn load_details(pool: &PgPool, orders: Vec<Order>) -> Result<Vec<OrderDetail>> {
    if orders.is_empty() {
        return Ok(vec![]);
    }
    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let cpfs: Vec<String> = orders.iter().filter_map(|o| o.customer_cpf.clone()).collect();
    let coupon_ids: Vec<i32> = orders.iter().filter_map(|o| o.discount_code_id).collect();

    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY id")
        .bind(&order_ids)
        .fetch_all(pool)
        .await?;
    let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<i32, Product> = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
        .bind(&product_ids)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let profiles: HashMap<String, CustomerProfile> =
        sqlx::query_as::<_, CustomerProfile>("SELECT * FROM customer_profiles WHERE cpf = ANY($1)")
            .bind(&cpfs)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|p| (p.cpf.clone(), p))
            .collect();
    let coupons: HashMap<i32, DiscountCode> =
        sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE id = ANY($1)")
            .bind(&coupon_ids)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

    let mut items_by_order: HashMap<i32, Vec<OrderItemDetail>> = HashMap::new();
    for item in items {
        let product = products.get(&item.product_id).cloned();
        items_by_order.entry(item.order_id).or_default().push(OrderItemDetail { item, product });
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderDetail {
            items: items_by_order.remove(&order.id).unwrap_or_default(),
            customer_profile: order.customer_cpf.as_ref().and_then(|cpf| profiles.get(cpf).cloned()),
            discount_code: order.discount_code_id.and_then(|id| coupons.get(&id).cloned()),
            order,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_key_display() {
        assert_eq!(OrderKey::Id(12).to_string(), "#12");
        assert_eq!(OrderKey::Number("TIT-1-001".into()).to_string(), "TIT-1-001");
    }
}
