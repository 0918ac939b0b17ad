use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::customer::Customer;
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{CustomerId, OrderId, ProductId};
use crate::product::Product;

/// Input for placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub product_ids: Vec<ProductId>,
    /// Defaults to 1.
    pub quantity: Option<u32>,
    /// Defaults to the placement time.
    pub order_date: Option<DateTime<Utc>>,
}

impl NewOrder {
    pub fn new(customer_id: CustomerId, product_ids: Vec<ProductId>) -> Self {
        Self {
            customer_id,
            product_ids,
            quantity: None,
            order_date: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn dated(mut self, order_date: DateTime<Utc>) -> Self {
        self.order_date = Some(order_date);
        self
    }
}

/// A placed order.
///
/// `total_price` is fixed when the order is placed; later product price changes do
/// not alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    product_ids: Vec<ProductId>,
    quantity: u32,
    total_price: Decimal,
    order_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Place an order for `customer` over the already-resolved `products`.
    ///
    /// Callers resolve `input.product_ids` against their store; `products` must contain
    /// one entry per requested id.
    pub fn place(
        id: OrderId,
        customer: &Customer,
        products: &[Product],
        input: &NewOrder,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if customer.id() != &input.customer_id {
            return Err(DomainError::invariant("customer_id mismatch"));
        }
        if input.product_ids.is_empty() {
            return Err(DomainError::validation("at least one product must be selected"));
        }
        if products.len() != input.product_ids.len() {
            return Err(DomainError::validation("Some product IDs are invalid"));
        }

        let quantity = input.quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let total_price = products
            .iter()
            .try_fold(Decimal::ZERO, |sum, product| sum.checked_add(product.price()))
            .ok_or_else(|| DomainError::validation("order total out of range"))?;

        Ok(Self {
            id,
            customer_id: input.customer_id,
            product_ids: products.iter().map(|p| *p.id()).collect(),
            quantity,
            total_price,
            order_date: input.order_date.unwrap_or(now),
            created_at: now,
        })
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn total_price(&self) -> Decimal {
        self.total_price
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::NewCustomer;
    use crate::product::NewProduct;
    use chrono::Duration;
    use proptest::prelude::*;

    fn customer() -> Customer {
        Customer::register(CustomerId::new(), &NewCustomer::new("Alice", "alice@example.com"), Utc::now()).unwrap()
    }

    fn product(cents: i64) -> Product {
        Product::create(ProductId::new(), &NewProduct::new("Item", Decimal::new(cents, 2)), Utc::now()).unwrap()
    }

    fn input_for(customer: &Customer, products: &[Product]) -> NewOrder {
        NewOrder::new(*customer.id(), products.iter().map(|p| *p.id()).collect())
    }

    #[test]
    fn place_derives_total_from_product_prices() {
        let alice = customer();
        let products = vec![product(99_999), product(2_550)];
        let order = Order::place(OrderId::new(), &alice, &products, &input_for(&alice, &products), Utc::now()).unwrap();

        assert_eq!(order.total_price(), Decimal::new(102_549, 2));
        assert_eq!(order.quantity(), 1);
        assert_eq!(order.product_ids().len(), 2);
    }

    #[test]
    fn place_keeps_explicit_order_date() {
        let alice = customer();
        let products = vec![product(100)];
        let date = Utc::now() - Duration::days(30);
        let input = input_for(&alice, &products).dated(date);

        let order = Order::place(OrderId::new(), &alice, &products, &input, Utc::now()).unwrap();
        assert_eq!(order.order_date(), date);
    }

    #[test]
    fn place_rejects_missing_products() {
        let alice = customer();
        let products = vec![product(100)];
        let mut input = input_for(&alice, &products);
        input.product_ids.push(ProductId::new());

        let err = Order::place(OrderId::new(), &alice, &products, &input, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("Some product IDs are invalid"));
    }

    #[test]
    fn place_rejects_empty_selection_and_zero_quantity() {
        let alice = customer();
        let empty = NewOrder::new(*alice.id(), vec![]);
        assert!(Order::place(OrderId::new(), &alice, &[], &empty, Utc::now()).is_err());

        let products = vec![product(100)];
        let zero = input_for(&alice, &products).with_quantity(0);
        assert!(Order::place(OrderId::new(), &alice, &products, &zero, Utc::now()).is_err());
    }

    #[test]
    fn place_rejects_a_total_past_the_decimal_range() {
        let alice = customer();
        let huge = Decimal::from_str_exact("50000000000000000000000000000").unwrap();
        let item = Product::create(ProductId::new(), &NewProduct::new("Yacht", huge), Utc::now()).unwrap();
        let products = vec![item.clone(), item];

        let err = Order::place(OrderId::new(), &alice, &products, &input_for(&alice, &products), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("order total out of range"));
    }

    proptest! {
        #[test]
        fn total_is_exact_sum_of_prices(cents in proptest::collection::vec(1i64..10_000_000, 1..20)) {
            let alice = customer();
            let products: Vec<Product> = cents.iter().copied().map(product).collect();
            let order = Order::place(OrderId::new(), &alice, &products, &input_for(&alice, &products), Utc::now()).unwrap();

            let expected: i64 = cents.iter().sum();
            prop_assert_eq!(order.total_price(), Decimal::new(expected, 2));
        }
    }
}
