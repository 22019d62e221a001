//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;
pub mod customer;

pub use product::{derive_price, Product, ProductError, StockChannel, StockType};
pub use order::{
    NewOrderLine, Order, OrderError, OrderItem, OrderStatus, SideEffect, StatusChange, StockBook, StockDecrement,
    StockLevel, Transition, TransitionError,
};
pub use cart::{Cart, CartError, CartItem, CartStore};
pub use coupon::{discount_amount, AppliedDiscount, CouponRejection, DiscountCode, DiscountType};
pub use customer::{CustomerProfile, CustomerSummary};
