//! In-memory cart state for the active order.
//!
//! A [`CartLine`] is one configured purchasable unit: a product reference, a
//! quantity, the unit price with option surcharges already applied, and the
//! selected options. Line ids are creation-time timestamps — local identity
//! only, never persisted.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One selected option on a cart line.
///
/// An explicit sum type instead of a loose string-keyed bag, so the
/// formatter can match exhaustively. `Toppings` holds zero or more values;
/// `Note` is the free-text special request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ItemOption {
    SpiceLevel(String),
    MeatType(String),
    Size(String),
    Toppings(Vec<String>),
    Note(String),
}

impl ItemOption {
    /// Label used on receipts, e.g. `- Spice Level: Sedang`.
    pub fn label(&self) -> &'static str {
        match self {
            ItemOption::SpiceLevel(_) => "Spice Level",
            ItemOption::MeatType(_) => "Meat",
            ItemOption::Size(_) => "Size",
            ItemOption::Toppings(_) => "Topping",
            ItemOption::Note(_) => "Note",
        }
    }
}

/// One configured purchasable unit in the active cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Locally generated id (creation timestamp in ms). Not persisted.
    pub id: i64,
    pub product_id: String,
    /// Display name, denormalized at add-time.
    pub name: String,
    pub quantity: u32,
    /// Price of one unit including selected option surcharges.
    pub unit_price: i64,
    /// `unit_price * quantity`.
    pub price: i64,
    #[serde(default)]
    pub options: Vec<ItemOption>,
}

impl CartLine {
    pub fn new(
        product_id: &str,
        name: &str,
        quantity: u32,
        unit_price: i64,
        options: Vec<ItemOption>,
    ) -> Self {
        Self {
            id: Utc::now().timestamp_millis(),
            product_id: product_id.to_string(),
            name: name.to_string(),
            quantity,
            unit_price,
            price: unit_price * i64::from(quantity),
            options,
        }
    }
}

/// The in-progress order basket.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a confirmed product + options selection as a new line.
    pub fn add(&mut self, line: CartLine) {
        self.lines.push(line);
    }

    /// Remove a line by its local id. Returns the removed line, if any.
    pub fn remove(&mut self, line_id: i64) -> Option<CartLine> {
        let idx = self.lines.iter().position(|l| l.id == line_id)?;
        Some(self.lines.remove(idx))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of line prices, in whole currency units.
    pub fn total(&self) -> i64 {
        self.lines.iter().map(|l| l.price).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
