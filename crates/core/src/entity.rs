//! Stored CRM records with a stable identity.

use chrono::{DateTime, Utc};

/// A record the data store keys by id (customers, products, orders).
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Creation time, stamped by the store.
    fn created_at(&self) -> DateTime<Utc>;
}
