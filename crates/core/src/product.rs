use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::ProductId;

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// Initial stock; defaults to zero.
    pub stock: Option<u32>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price,
            stock: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }
}

/// A sellable product.
///
/// Stock is unsigned, so a product can never be observed with negative stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    stock: u32,
    created_at: DateTime<Utc>,
}

impl Product {
    pub fn create(id: ProductId, input: &NewProduct, created_at: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if input.price <= Decimal::ZERO {
            return Err(DomainError::validation("price must be positive"));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            description: input.description.clone(),
            price: input.price,
            stock: input.stock.unwrap_or(0),
            created_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    /// Add `quantity` units to stock (saturating).
    pub fn restock(&mut self, quantity: u32) {
        self.stock = self.stock.saturating_add(quantity);
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Server-side restock rule behind the low-stock mutation.
///
/// Products whose stock is strictly below `threshold` receive `increment` units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockPolicy {
    pub threshold: u32,
    pub increment: u32,
}

impl Default for RestockPolicy {
    fn default() -> Self {
        Self {
            threshold: 10,
            increment: 10,
        }
    }
}

impl RestockPolicy {
    pub fn needs_restock(&self, product: &Product) -> bool {
        product.stock < self.threshold
    }

    /// Apply the policy; returns whether the product was restocked.
    pub fn apply(&self, product: &mut Product) -> bool {
        if !self.needs_restock(product) {
            return false;
        }
        product.restock(self.increment);
        true
    }
}
