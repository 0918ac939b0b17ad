//! `crm-core`: CRM record types shared by the job runner and the data stores.
//!
//! This crate contains **pure domain** primitives (no IO, no HTTP, no storage).

pub mod customer;
pub mod entity;
pub mod error;
pub mod id;
pub mod order;
pub mod product;

pub use customer::{Customer, Email, NewCustomer, Phone};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, OrderId, ProductId};
pub use order::{NewOrder, Order};
pub use product::{NewProduct, Product, RestockPolicy};
