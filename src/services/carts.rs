use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, CartStore};
use crate::Result;

/// Carts persisted in `cart_items`, priced from the live catalog on load.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn load(&self, session_id: Uuid) -> Result<Cart> {
        let items = sqlx::query_as::<_, CartItem>(
            "SELECT c.product_id, p.name AS product_name, p.brand, p.image_url, p.price, c.quantity
             FROM cart_items c JOIN products p ON p.id = c.product_id
             WHERE c.session_id = $1
             ORDER BY c.position",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Cart::with_items(session_id, items)?)
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(cart.session_id())
            .execute(&mut *tx)
            .await?;
        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query("INSERT INTO cart_items (session_id, product_id, quantity, position) VALUES ($1, $2, $3, $4)")
                .bind(cart.session_id())
                .bind(item.product_id)
                .bind(item.quantity)
                .bind(position as i32)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(session_id).execute(&self.pool).await?;
        Ok(())
    }
}
