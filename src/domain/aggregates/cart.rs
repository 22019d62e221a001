//! Cart Aggregate

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::order::NewOrderLine;
use crate::domain::value_objects::MAX_LINE_QUANTITY;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    session_id: Uuid,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: i32,
    pub product_name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
}

impl Cart {
    pub fn new(session_id: Uuid) -> Self {
        Self { session_id, items: vec![], updated_at: Utc::now() }
    }

    /// Rebuilds a cart from stored or submitted items, merging repeated products.
    pub fn with_items(session_id: Uuid, items: Vec<CartItem>) -> Result<Self, CartError> {
        let mut cart = Self::new(session_id);
        for item in items { cart.add_item(item)?; }
        Ok(cart)
    }

    pub fn session_id(&self) -> Uuid { self.session_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total(&self) -> Decimal { self.items.iter().map(CartItem::line_total).sum() }
    pub fn items_count(&self) -> i64 { self.items.iter().map(|i| i64::from(i.quantity)).sum() }

    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        let quantity = checked_quantity(item.quantity)?;
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            let merged = existing.quantity.checked_add(quantity).ok_or(CartError::InvalidQuantity)?;
            existing.quantity = checked_quantity(merged)?;
        } else {
            self.items.push(item);
        }
        self.touch();
        Ok(())
    }

    /// A quantity of zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: i32, quantity: i32) -> Result<(), CartError> {
        if quantity <= 0 { return self.remove_item(product_id); }
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        item.quantity = checked_quantity(quantity)?;
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: i32) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    pub fn checkout_lines(&self) -> Vec<NewOrderLine> {
        self.items.iter().map(|i| NewOrderLine {
            product_id: i.product_id,
            quantity: i.quantity,
            unit_price: i.price,
            title: Some(i.product_name.clone()),
        }).collect()
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Line quantities run from 1 to [`MAX_LINE_QUANTITY`].
fn checked_quantity(quantity: i32) -> Result<i32, CartError> {
    if quantity <= 0 || quantity > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
    Ok(quantity)
}

/// Where carts live between requests.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load(&self, session_id: Uuid) -> crate::Result<Cart>;
    async fn save(&self, cart: &Cart) -> crate::Result<()>;
    async fn clear(&self, session_id: Uuid) -> crate::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item não encontrado no carrinho")]
    ItemNotFound,
    #[error("Quantidade inválida")]
    InvalidQuantity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    fn whey(quantity: i32) -> CartItem {
        CartItem { product_id: 1, product_name: "Whey".into(), brand: None, image_url: None, price: Decimal::new(10, 0), quantity }
    }

    #[derive(Default)]
    struct MemoryCartStore(Mutex<HashMap<Uuid, Vec<CartItem>>>);

    #[async_trait]
    impl CartStore for MemoryCartStore {
        async fn load(&self, session_id: Uuid) -> crate::Result<Cart> {
            let items = self.0.lock().await.get(&session_id).cloned().unwrap_or_default();
            Ok(Cart::with_items(session_id, items)?)
        }
        async fn save(&self, cart: &Cart) -> crate::Result<()> {
            self.0.lock().await.insert(cart.session_id(), cart.items().to_vec());
            Ok(())
        }
        async fn clear(&self, session_id: Uuid) -> crate::Result<()> {
            self.0.lock().await.remove(&session_id);
            Ok(())
        }
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(whey(2)).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total(), Decimal::new(20, 0));
        cart.add_item(whey(1)).unwrap();
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert_eq!(cart.items_count(), 3);
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(whey(2)).unwrap();
        cart.update_quantity(1, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.update_quantity(1, 4), Err(CartError::ItemNotFound));
        assert_eq!(cart.add_item(whey(0)), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_merged_quantity_is_capped() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(whey(MAX_LINE_QUANTITY)).unwrap();
        assert_eq!(cart.add_item(whey(1)), Err(CartError::InvalidQuantity));
        assert_eq!(cart.items()[0].quantity, MAX_LINE_QUANTITY);
        assert_eq!(cart.add_item(whey(i32::MAX)), Err(CartError::InvalidQuantity));
        assert_eq!(cart.update_quantity(1, MAX_LINE_QUANTITY + 1), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_checkout_lines_freeze_price() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(whey(2)).unwrap();
        let lines = cart.checkout_lines();
        assert_eq!(lines[0].unit_price, Decimal::new(10, 0));
        assert_eq!(lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_store_round_trip_and_clear() {
        let store = MemoryCartStore::default();
        let session = Uuid::new_v4();
        let mut cart = store.load(session).await.unwrap();
        assert!(cart.is_empty());
        cart.add_item(whey(1)).unwrap();
        store.save(&cart).await.unwrap();
        assert_eq!(store.load(session).await.unwrap().items_count(), 1);
        store.clear(session).await.unwrap();
        assert!(store.load(session).await.unwrap().is_empty());
    }
}
