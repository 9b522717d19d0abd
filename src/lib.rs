//! Warung POS core: cart, checkout, receipt formatting, and thermal
//! printer transport for a small Indonesian kebab warung.
//!
//! The flow mirrors the counter: build a [`cart::Cart`], select a customer,
//! run [`checkout::Register::checkout`] against an [`orders::OrderStore`]
//! (SQLite via [`db::DbState`]), then render the kitchen ticket and customer
//! receipt with [`receipt::ReceiptFormatter`] and push the bytes through
//! [`printer::PrinterTransport`] to a Bluetooth thermal printer.
//!
//! Printing is decoupled from checkout: orders persist even when the
//! printer is offline, and receipts can be reprinted from a stored order.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod cart;
pub mod checkout;
pub mod db;
pub mod escpos;
pub mod money;
pub mod orders;
pub mod printer;
pub mod receipt;

pub use cart::{Cart, CartLine, ItemOption};
pub use checkout::{CheckoutError, CheckoutOutcome, Register};
pub use db::DbState;
pub use orders::{
    Customer, Order, OrderDraft, OrderFilter, OrderStore, OrderStoreError, PaymentMethod,
};
pub use printer::{ConnectionInfo, DeviceLink, LinkState, PrinterTransport, SharedPrinter};
pub use receipt::{BrandProfile, ReceiptFormatter};

/// Initialize tracing: console output always, plus a daily rolling file
/// in `log_dir` when given.
///
/// Respects `RUST_LOG`; defaults to `info` globally with debug for this
/// crate. Returns the appender guard — hold it for the process lifetime,
/// dropping it flushes buffered log lines.
pub fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,warung_pos=debug"));

    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "warung");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            registry.with(file_layer).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}
