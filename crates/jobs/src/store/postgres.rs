//! Postgres-backed aggregate reads.
//!
//! Reads the CRM tables directly (`crm_customer`, `crm_order.total_price`). Queries
//! run on the provided tokio runtime and block the calling thread, so this store must
//! be used from plain threads (the scheduler's job threads), never from async code.

use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres};
use tokio::runtime::Handle;

use super::{DataStore, StoreError};

const COUNT_CUSTOMERS: &str = "SELECT COUNT(*) FROM crm_customer";
const COUNT_ORDERS: &str = "SELECT COUNT(*) FROM crm_order";
const SUM_ORDER_TOTALS: &str = "SELECT COALESCE(SUM(total_price), 0)::NUMERIC FROM crm_order";

pub struct PostgresDataStore {
    pool: PgPool,
    runtime: Handle,
}

impl std::fmt::Debug for PostgresDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDataStore").finish_non_exhaustive()
    }
}

impl PostgresDataStore {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }

    /// Build a pool without connecting; connections are opened on first use, so an
    /// unreachable database surfaces as a per-query [`StoreError::Unavailable`].
    pub fn connect_lazy(database_url: &str, runtime: Handle) -> Result<Self, StoreError> {
        let pool = {
            let _guard = runtime.enter();
            PgPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(5))
                .connect_lazy(database_url)
                .map_err(map_sqlx_error)?
        };

        Ok(Self::new(pool, runtime))
    }

    fn scalar<T>(&self, sql: &'static str) -> Result<T, StoreError>
    where
        T: Send + Unpin,
        (T,): for<'r> FromRow<'r, PgRow>,
    {
        self.runtime
            .block_on(sqlx::query_scalar::<Postgres, T>(sql).fetch_one(&self.pool))
            .map_err(map_sqlx_error)
    }

    fn count(&self, sql: &'static str) -> Result<u64, StoreError> {
        let count: i64 = self.scalar(sql)?;
        u64::try_from(count).map_err(|_| StoreError::Query(format!("negative count: {count}")))
    }
}

impl DataStore for PostgresDataStore {
    fn count_customers(&self) -> Result<u64, StoreError> {
        self.count(COUNT_CUSTOMERS)
    }

    fn count_orders(&self) -> Result<u64, StoreError> {
        self.count(COUNT_ORDERS)
    }

    fn sum_order_totals(&self) -> Result<Decimal, StoreError> {
        self.scalar(SUM_ORDER_TOTALS)
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Query(other.to_string()),
    }
}
