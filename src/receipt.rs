//! Receipt formatting for Warung POS.
//!
//! Pure rendering: an order plus its resolved items goes in, an ESC/POS
//! byte stream comes out. No I/O, no clock reads — identical input yields
//! byte-identical output, so both documents are unit-testable without a
//! device.
//!
//! Two documents exist: the customer receipt (itemized pricing, payment
//! summary, Code39 barcode of the order number) and the kitchen ticket
//! (names, quantities, options and notes only — kitchen staff must never
//! see prices).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::ItemOption;
use crate::escpos::{EscPosBuilder, PaperWidth};
use crate::money::rupiah;
use crate::orders::{Order, OrderItem, PaymentMethod};

// ---------------------------------------------------------------------------
// Brand profile
// ---------------------------------------------------------------------------

/// Store identity printed in the customer-receipt header block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandProfile {
    pub name: String,
    pub slogan: String,
    pub address: String,
    pub phone: String,
}

impl Default for BrandProfile {
    fn default() -> Self {
        Self {
            name: "WARUNG KEBAB SULTAN".to_string(),
            slogan: "Kebab & Burger".to_string(),
            address: "Jl. Merdeka No. 12, Bandung".to_string(),
            phone: "0812-3456-7890".to_string(),
        }
    }
}

impl BrandProfile {
    /// Load the profile from the `brand` settings category, falling back to
    /// compiled-in defaults for missing keys.
    pub fn from_settings(conn: &rusqlite::Connection) -> Self {
        let defaults = Self::default();
        let get = |key: &str, fallback: String| {
            crate::db::get_setting(conn, "brand", key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };
        Self {
            name: get("name", defaults.name),
            slogan: get("slogan", defaults.slogan),
            address: get("address", defaults.address),
            phone: get("phone", defaults.phone),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("receipt has no items")]
    NoItems,
    #[error("malformed receipt item: {0}")]
    MalformedItem(String),
}

fn validate_items(items: &[OrderItem]) -> Result<(), ReceiptError> {
    if items.is_empty() {
        return Err(ReceiptError::NoItems);
    }
    for item in items {
        if item.name.trim().is_empty() {
            return Err(ReceiptError::MalformedItem(format!(
                "item {} has an empty name",
                item.product_id
            )));
        }
        if item.quantity == 0 {
            return Err(ReceiptError::MalformedItem(format!(
                "item \"{}\" has zero quantity",
                item.name
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

pub struct ReceiptFormatter {
    brand: BrandProfile,
    paper: PaperWidth,
}

impl ReceiptFormatter {
    pub fn new(brand: BrandProfile) -> Self {
        Self {
            brand,
            paper: PaperWidth::Mm58,
        }
    }

    pub fn with_paper(mut self, paper: PaperWidth) -> Self {
        self.paper = paper;
        self
    }

    fn builder(&self) -> EscPosBuilder {
        EscPosBuilder::new().with_paper(self.paper)
    }

    /// Render the kitchen ticket: item names, quantities, options and notes.
    ///
    /// No pricing information appears anywhere in this document.
    pub fn format_kitchen_ticket(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<Vec<u8>, ReceiptError> {
        validate_items(items)?;

        let mut b = self.builder();
        b.init()
            .center()
            .double_height()
            .text_line("KITCHEN ORDER")
            .normal_size()
            .left()
            .separator()
            .text_line(&format!("Order: {}", order.order_number))
            .text_line(&format!("Customer: {}", order.customer_name))
            .lf();

        for item in items {
            b.bold(true)
                .text_line(&format!("{}x {}", item.quantity, item.name))
                .bold(false);
            for line in option_lines(&item.options) {
                b.text_line(&line);
            }
        }

        b.separator()
            .center()
            .text_line("SEGERA DISIAPKAN")
            .lf()
            .lf()
            .lf()
            .cut();

        Ok(b.build())
    }

    /// Render the customer receipt: itemized pricing, totals, payment
    /// summary, and a Code39 barcode of the order number when present.
    ///
    /// `cash_tendered` is only honored for cash payments; a value greater
    /// than the total adds a `Kembali` (change) line.
    pub fn format_customer_receipt(
        &self,
        order: &Order,
        items: &[OrderItem],
        method: PaymentMethod,
        cash_tendered: i64,
    ) -> Result<Vec<u8>, ReceiptError> {
        validate_items(items)?;

        let mut b = self.builder();
        b.init()
            .center()
            .double_height()
            .text_line(&self.brand.name)
            .normal_size()
            .text_line(&self.brand.slogan)
            .text_line(&self.brand.address)
            .text_line(&self.brand.phone)
            .left()
            .separator()
            .text_line(&format!("Order    : {}", order.order_number))
            .text_line(&format!("Kasir    : {}", order.cashier))
            .text_line(&format!(
                "Waktu    : {}",
                order.created_at.format("%d/%m/%Y %H:%M")
            ))
            .text_line(&format!("Pelanggan: {}", order.customer_name))
            .separator();

        for item in items {
            b.column_pair(
                &format!("{}x {}", item.quantity, item.name),
                &rupiah(item.total_price),
            );
            if item.quantity > 1 {
                b.text_line(&format!("  @ {}", rupiah(item.unit_price)));
            }
            for line in option_lines(&item.options) {
                b.text_line(&line);
            }
        }

        let subtotal: i64 = items.iter().map(|i| i.total_price).sum();

        b.separator()
            .column_pair("Subtotal", &rupiah(subtotal))
            .bold(true)
            .column_pair("TOTAL", &rupiah(order.total_amount))
            .bold(false)
            .column_pair("Metode", method.receipt_label());

        if method == PaymentMethod::Cash && cash_tendered > 0 {
            b.column_pair("Bayar", &rupiah(cash_tendered));
            if cash_tendered > order.total_amount {
                b.column_pair("Kembali", &rupiah(cash_tendered - order.total_amount));
            }
        }

        b.lf()
            .center()
            .text_line("Terima Kasih!")
            .text_line("Selamat Menikmati");

        if !order.order_number.trim().is_empty() {
            b.lf().barcode_code39(&order.order_number);
        }

        b.feed(3).cut();

        Ok(b.build())
    }
}

/// Render option lines for one item, shared by both documents.
///
/// Single-value options become `  - {label}: {value}`, toppings are joined
/// with `", "`, and the free-text note becomes `  Note: {text}`. Empty
/// selections render nothing.
fn option_lines(options: &[ItemOption]) -> Vec<String> {
    let mut out = Vec::new();
    for opt in options {
        match opt {
            ItemOption::SpiceLevel(value)
            | ItemOption::MeatType(value)
            | ItemOption::Size(value) => {
                let value = value.trim();
                if !value.is_empty() {
                    out.push(format!("  - {}: {}", opt.label(), value));
                }
            }
            ItemOption::Toppings(values) => {
                let joined = values
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");
                if !joined.is_empty() {
                    out.push(format!("  - {}: {}", opt.label(), joined));
                }
            }
            ItemOption::Note(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(format!("  Note: {text}"));
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
