use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crm_core::{
    Customer, CustomerId, DomainError, Entity, NewCustomer, NewOrder, NewProduct, Order, OrderId, Product,
    ProductId, RestockPolicy,
};

use super::{DataStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
}

/// Result of a bulk customer import: valid entries are kept, invalid ones reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkCreateOutcome {
    pub created: Vec<Customer>,
    pub errors: Vec<String>,
}

/// In-memory data store for tests/dev.
///
/// Enforces the store-owned rules (unique email, resolvable order references).
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    tables: RwLock<Tables>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn create_customer(&self, input: &NewCustomer) -> Result<Customer, StoreError> {
        let mut tables = self.write()?;
        insert_customer(&mut tables, input, Utc::now())
    }

    /// Create every valid customer; collect one message per rejected entry.
    pub fn bulk_create_customers(&self, inputs: &[NewCustomer]) -> Result<BulkCreateOutcome, StoreError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let mut outcome = BulkCreateOutcome::default();

        for input in inputs {
            match insert_customer(&mut tables, input, now) {
                Ok(customer) => outcome.created.push(customer),
                Err(e) => outcome
                    .errors
                    .push(format!("Error creating customer {}: {}", input.name, e)),
            }
        }

        Ok(outcome)
    }

    pub fn create_product(&self, input: &NewProduct) -> Result<Product, StoreError> {
        let product = Product::create(ProductId::new(), input, Utc::now())?;
        self.write()?.products.insert(*product.id(), product.clone());
        Ok(product)
    }

    /// Place an order; the total is derived from the referenced products' current prices.
    pub fn create_order(&self, input: &NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.write()?;

        let customer = tables
            .customers
            .get(&input.customer_id)
            .ok_or_else(|| DomainError::not_found("Customer"))?;

        let products: Vec<Product> = input
            .product_ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect();

        let order = Order::place(OrderId::new(), customer, &products, input, Utc::now())?;
        tables.orders.insert(*order.id(), order.clone());
        Ok(order)
    }

    /// Apply `policy` to every product; returns the restocked products.
    pub fn restock_low_stock(&self, policy: RestockPolicy) -> Result<Vec<Product>, StoreError> {
        let mut tables = self.write()?;
        let restocked: Vec<Product> = tables
            .products
            .values_mut()
            .filter_map(|product| policy.apply(product).then(|| product.clone()))
            .collect();

        debug!(count = restocked.len(), threshold = policy.threshold, "restocked low-stock products");
        Ok(restocked)
    }

    pub fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.read()?.customers.get(&id).cloned())
    }

    pub fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.read()?.products.values().cloned().collect())
    }

    /// Orders dated on or after `since` (UTC calendar date), oldest id first.
    pub fn orders_since(&self, since: NaiveDate) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .read()?
            .orders
            .values()
            .filter(|order| order.order_date().date_naive() >= since)
            .cloned()
            .collect())
    }
}

fn insert_customer(tables: &mut Tables, input: &NewCustomer, now: DateTime<Utc>) -> Result<Customer, StoreError> {
    let customer = Customer::register(CustomerId::new(), input, now)?;

    if tables.customers.values().any(|c| c.email() == customer.email()) {
        return Err(DomainError::conflict("Email already exists").into());
    }

    tables.customers.insert(*customer.id(), customer.clone());
    Ok(customer)
}

impl DataStore for InMemoryDataStore {
    fn count_customers(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.customers.len() as u64)
    }

    fn count_orders(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.orders.len() as u64)
    }

    fn sum_order_totals(&self) -> Result<Decimal, StoreError> {
        self.read()?
            .orders
            .values()
            .try_fold(Decimal::ZERO, |sum, order| sum.checked_add(order.total_price()))
            .ok_or_else(|| StoreError::Query("order total sum out of range".to_string()))
    }
}
