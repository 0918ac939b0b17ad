//! Direct data store access.
//!
//! Jobs normally go through the remote endpoint; the store is only read when that
//! endpoint is unreachable (report fallback).

mod in_memory;
mod postgres;

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use crm_core::DomainError;

pub use in_memory::{BulkCreateOutcome, InMemoryDataStore};
pub use postgres::PostgresDataStore;

/// Data store error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no data store configured")]
    NotConfigured,

    #[error("data store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Aggregate reads over customers and orders.
pub trait DataStore: Send + Sync {
    fn count_customers(&self) -> Result<u64, StoreError>;

    fn count_orders(&self) -> Result<u64, StoreError>;

    /// Sum of the stored order totals (zero when there are no orders).
    fn sum_order_totals(&self) -> Result<Decimal, StoreError>;
}

impl<S> DataStore for Arc<S>
where
    S: DataStore + ?Sized,
{
    fn count_customers(&self) -> Result<u64, StoreError> {
        (**self).count_customers()
    }

    fn count_orders(&self) -> Result<u64, StoreError> {
        (**self).count_orders()
    }

    fn sum_order_totals(&self) -> Result<Decimal, StoreError> {
        (**self).sum_order_totals()
    }
}
