//! Checkout orchestration for Warung POS.
//!
//! Converts the in-memory session (cart + selected customer) plus a chosen
//! payment method into a persisted order. Printing is deliberately not part
//! of checkout — it is an explicit follow-up by the caller, so checkout
//! succeeds even when no printer is connected.
//!
//! Persistence failures abort the checkout without touching session state:
//! the cart and customer selection stay intact so the operator can retry.
//! Retrying is always an explicit operator action — nothing here retries
//! automatically, which guards against accidental duplicate orders.

use thiserror::Error;
use tracing::info;

use crate::cart::Cart;
use crate::orders::{
    Customer, Order, OrderDraft, OrderItem, OrderStatus, OrderStore, OrderStoreError,
    PaymentMethod, PaymentStatus,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("no customer selected")]
    NoCustomer,
    #[error("cart is empty")]
    EmptyCart,
    #[error("cash amount is required for cash payment")]
    MissingCashAmount,
    #[error("insufficient cash: tendered {tendered}, total {total}")]
    InsufficientCash { tendered: i64, total: i64 },
    #[error(transparent)]
    Persist(#[from] OrderStoreError),
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

/// Result of a successful checkout: the persisted order (with its assigned
/// order number) and the change due for cash payments.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub change: i64,
}

/// One operator's in-memory POS session: the active cart and the selected
/// customer. Owned by the composition root, not ambient global state.
pub struct Register {
    cart: Cart,
    customer: Option<Customer>,
    cashier: String,
}

impl Register {
    pub fn new(cashier: &str) -> Self {
        Self {
            cart: Cart::new(),
            customer: None,
            cashier: cashier.to_string(),
        }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn cashier(&self) -> &str {
        &self.cashier
    }

    pub fn select_customer(&mut self, customer: Customer) {
        self.customer = Some(customer);
    }

    pub fn selected_customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn clear_customer(&mut self) {
        self.customer = None;
    }

    /// Convert the session into a persisted order.
    ///
    /// - `Cash` requires `cash_tendered >= total`; change is the difference.
    /// - `Qris` is marked paid on operator confirmation — attestation is
    ///   manual, no payment gateway is consulted.
    /// - `Unpaid` persists as pending/pending under its own explicit
    ///   payment method, to be settled later.
    ///
    /// On success the cart and customer selection are cleared; on any
    /// failure they are left untouched for an operator retry.
    pub fn checkout(
        &mut self,
        store: &dyn OrderStore,
        method: PaymentMethod,
        cash_tendered: Option<i64>,
        notes: Option<String>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let customer = self.customer.as_ref().ok_or(CheckoutError::NoCustomer)?;
        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = self.cart.total();

        let (payment_status, order_status, change) = match method {
            PaymentMethod::Cash => {
                let tendered = cash_tendered.ok_or(CheckoutError::MissingCashAmount)?;
                if tendered < total {
                    return Err(CheckoutError::InsufficientCash { tendered, total });
                }
                (PaymentStatus::Paid, OrderStatus::Completed, tendered - total)
            }
            PaymentMethod::Qris => (PaymentStatus::Paid, OrderStatus::Completed, 0),
            PaymentMethod::Unpaid => (PaymentStatus::Pending, OrderStatus::Pending, 0),
        };

        let items: Vec<OrderItem> = self
            .cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.price,
                options: line.options.clone(),
            })
            .collect();

        let draft = OrderDraft {
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            cashier: self.cashier.clone(),
            total_amount: total,
            payment_method: method,
            payment_status,
            order_status,
            notes,
            items,
        };

        let order = store.create_order(&draft)?;

        info!(
            order_number = %order.order_number,
            method = method.as_str(),
            total,
            change,
            "Checkout completed"
        );

        self.cart.clear();
        self.customer = None;

        Ok(CheckoutOutcome { order, change })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
