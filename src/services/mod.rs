//! Storage-backed operations. Each function owns its queries and, where
//! several rows must change together, its transaction.

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod customers;
pub mod orders;

/// Postgres `foreign_key_violation`.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().and_then(|e| e.code()).as_deref() == Some("23503")
}
