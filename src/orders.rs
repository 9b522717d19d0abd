//! Order domain types and the persistence collaborator contract.
//!
//! The checkout orchestrator builds an [`OrderDraft`] from the cart and
//! hands it to an [`OrderStore`]; the store assigns identity (`id`,
//! `order_number`) and returns the persisted [`Order`]. The SQLite
//! implementation lives in `db.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::ItemOption;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the customer pays. `Unpaid` is an explicit method for orders settled
/// later, not a placeholder value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Qris,
    Unpaid,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Unpaid => "unpaid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "qris" => Some(PaymentMethod::Qris),
            "unpaid" => Some(PaymentMethod::Unpaid),
            _ => None,
        }
    }

    /// Receipt label for the payment-method line.
    pub fn receipt_label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "TUNAI",
            PaymentMethod::Qris => "QRIS",
            PaymentMethod::Unpaid => "BELUM BAYAR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "paid" => Some(PaymentStatus::Paid),
            "pending" => Some(PaymentStatus::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Completed,
    Pending,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
            OrderStatus::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Some(OrderStatus::Completed),
            "pending" => Some(OrderStatus::Pending),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One denormalized order line as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub total_price: i64,
    #[serde(default)]
    pub options: Vec<ItemOption>,
}

/// Order-creation request, before the store assigns identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer_id: String,
    pub customer_name: String,
    pub cashier: String,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
}

/// A persisted order, as returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub cashier: String,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// Filters for order listing. All fields optional; `None` means no filter.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub payment_status: Option<PaymentStatus>,
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("order persistence failed: {0}")]
    Persist(String),
    #[error("order not found: {0}")]
    NotFound(String),
    #[error("invalid stored record: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for OrderStoreError {
    fn from(err: rusqlite::Error) -> Self {
        OrderStoreError::Persist(err.to_string())
    }
}

/// External persistence collaborator for orders.
///
/// `create_order` must assign `id` and `order_number` and return the full
/// persisted record. Implementations never retry internally — retry is an
/// explicit operator action, guarding against duplicate orders.
pub trait OrderStore {
    fn create_order(&self, draft: &OrderDraft) -> Result<Order, OrderStoreError>;
    fn get_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderStoreError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_round_trip() {
        for method in [PaymentMethod::Cash, PaymentMethod::Qris, PaymentMethod::Unpaid] {
            assert_eq!(PaymentMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(PaymentMethod::parse("transfer"), None);
    }

    #[test]
    fn test_receipt_labels() {
        assert_eq!(PaymentMethod::Cash.receipt_label(), "TUNAI");
        assert_eq!(PaymentMethod::Qris.receipt_label(), "QRIS");
        assert_eq!(PaymentMethod::Unpaid.receipt_label(), "BELUM BAYAR");
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(PaymentStatus::parse(" Paid "), Some(PaymentStatus::Paid));
        assert_eq!(OrderStatus::parse("COMPLETED"), Some(OrderStatus::Completed));
        assert_eq!(OrderStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_enum_serde_uses_lowercase() {
        let json = serde_json::to_string(&PaymentMethod::Qris).unwrap();
        assert_eq!(json, r#""qris""#);
        let back: PaymentStatus = serde_json::from_str(r#""pending""#).unwrap();
        assert_eq!(back, PaymentStatus::Pending);
    }
}
