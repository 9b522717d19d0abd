//! Local SQLite database layer for Warung POS.
//!
//! Uses rusqlite with WAL mode. Provides schema migrations, settings
//! helpers, customer administration, and the [`OrderStore`] implementation
//! used by checkout. The connection lives behind a `Mutex` so one `DbState`
//! can be shared across the application.

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use chrono::{DateTime, Utc};

use crate::cart::ItemOption;
use crate::orders::{
    Customer, Order, OrderDraft, OrderFilter, OrderItem, OrderStatus, OrderStore, OrderStoreError,
    PaymentMethod, PaymentStatus,
};

/// Shared database state holding the connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Order numbers look like `WRG-20260825-001`, restarting the sequence
/// daily.
const ORDER_NUMBER_PREFIX: &str = "WRG";

/// Initialize the database at `{data_dir}/warung.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> Result<DbState, OrderStoreError> {
    fs::create_dir_all(data_dir)
        .map_err(|e| OrderStoreError::Persist(format!("create data dir: {e}")))?;

    let db_path = data_dir.join("warung.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                // Also remove WAL/SHM files if present
                let _ = fs::remove_file(db_path.with_extension("db-wal"));
                let _ = fs::remove_file(db_path.with_extension("db-shm"));
            }
            open_and_configure(&db_path)?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

impl DbState {
    /// In-memory database with the full schema applied. Test use only.
    pub fn open_in_memory() -> Result<Self, OrderStoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, OrderStoreError> {
        self.conn
            .lock()
            .map_err(|_| OrderStoreError::Persist("database lock poisoned".into()))
    }
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, OrderStoreError> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), OrderStoreError> {
    // Ensure schema_version table exists first
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: core tables.
fn migrate_v1(conn: &Connection) -> Result<(), OrderStoreError> {
    conn.execute_batch(
        "
        -- local_settings (category/key/value store)
        CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );

        -- customers
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT,
            created_at TEXT NOT NULL
        );

        -- orders
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_number TEXT UNIQUE NOT NULL,
            customer_id TEXT NOT NULL,
            customer_name TEXT NOT NULL,
            cashier TEXT NOT NULL,
            total_amount INTEGER NOT NULL DEFAULT 0,
            payment_method TEXT NOT NULL,
            payment_status TEXT NOT NULL DEFAULT 'pending',
            order_status TEXT NOT NULL DEFAULT 'pending',
            notes TEXT,
            created_at TEXT NOT NULL
        );

        -- order_items (denormalized snapshot; options stored as JSON)
        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            product_id TEXT NOT NULL,
            name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price INTEGER NOT NULL,
            total_price INTEGER NOT NULL,
            options TEXT NOT NULL DEFAULT '[]'
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);
        CREATE INDEX IF NOT EXISTS idx_orders_payment_status ON orders(payment_status);
        CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);
        CREATE INDEX IF NOT EXISTS idx_local_settings_cat_key ON local_settings(setting_category, setting_key);

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        OrderStoreError::Persist(format!("migration v1: {e}"))
    })?;

    info!("Applied migration v1");
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Get a single setting value.
pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .ok()
}

/// Insert or update a setting.
pub fn set_setting(
    conn: &Connection,
    category: &str,
    key: &str,
    value: &str,
) -> Result<(), OrderStoreError> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

impl DbState {
    pub fn create_customer(
        &self,
        name: &str,
        phone: Option<&str>,
    ) -> Result<Customer, OrderStoreError> {
        let conn = self.lock()?;
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO customers (id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                customer.id,
                customer.name,
                customer.phone,
                customer.created_at.to_rfc3339()
            ],
        )?;
        info!(customer_id = %customer.id, name = %customer.name, "Customer created");
        Ok(customer)
    }

    pub fn list_customers(&self) -> Result<Vec<Customer>, OrderStoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, phone, created_at FROM customers ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut customers = Vec::new();
        for row in rows {
            let (id, name, phone, created_at) = row?;
            customers.push(Customer {
                id,
                name,
                phone,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(customers)
    }

    pub fn delete_customer(&self, customer_id: &str) -> Result<(), OrderStoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM customers WHERE id = ?1", params![customer_id])?;
        if changed == 0 {
            return Err(OrderStoreError::NotFound(customer_id.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

impl DbState {
    /// Load one order with its items.
    pub fn get_order(&self, order_id: &str) -> Result<Order, OrderStoreError> {
        let conn = self.lock()?;
        let order = conn
            .query_row(
                "SELECT id, order_number, customer_id, customer_name, cashier, total_amount,
                        payment_method, payment_status, order_status, notes, created_at
                 FROM orders WHERE id = ?1",
                params![order_id],
                map_order_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    OrderStoreError::NotFound(order_id.to_string())
                }
                other => other.into(),
            })?;
        finish_order(&conn, order)
    }

    /// Settle a deferred-payment order: record the actual method, mark it
    /// paid and completed. Only pending orders can be settled.
    pub fn settle_order(
        &self,
        order_id: &str,
        method: PaymentMethod,
    ) -> Result<Order, OrderStoreError> {
        if method == PaymentMethod::Unpaid {
            return Err(OrderStoreError::Persist(
                "cannot settle an order as unpaid".into(),
            ));
        }
        {
            let conn = self.lock()?;
            let changed = conn.execute(
                "UPDATE orders SET payment_method = ?1, payment_status = 'paid',
                        order_status = 'completed'
                 WHERE id = ?2 AND payment_status = 'pending'",
                params![method.as_str(), order_id],
            )?;
            if changed == 0 {
                return Err(OrderStoreError::NotFound(order_id.to_string()));
            }
        }
        info!(order_id, method = method.as_str(), "Order settled");
        self.get_order(order_id)
    }
}

impl OrderStore for DbState {
    fn create_order(&self, draft: &OrderDraft) -> Result<Order, OrderStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let created_at = Utc::now();
        let id = Uuid::new_v4().to_string();
        let order_number = next_order_number(&tx, created_at)?;

        tx.execute(
            "INSERT INTO orders (id, order_number, customer_id, customer_name, cashier,
                                 total_amount, payment_method, payment_status, order_status,
                                 notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                order_number,
                draft.customer_id,
                draft.customer_name,
                draft.cashier,
                draft.total_amount,
                draft.payment_method.as_str(),
                draft.payment_status.as_str(),
                draft.order_status.as_str(),
                draft.notes,
                created_at.to_rfc3339()
            ],
        )?;

        for item in &draft.items {
            let options = serde_json::to_string(&item.options)
                .map_err(|e| OrderStoreError::Persist(format!("encode options: {e}")))?;
            tx.execute(
                "INSERT INTO order_items (order_id, product_id, name, quantity, unit_price,
                                          total_price, options)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    item.product_id,
                    item.name,
                    item.quantity,
                    item.unit_price,
                    item.total_price,
                    options
                ],
            )?;
        }

        tx.commit()?;

        info!(order_number = %order_number, total = draft.total_amount, "Order persisted");

        Ok(Order {
            id,
            order_number,
            customer_id: draft.customer_id.clone(),
            customer_name: draft.customer_name.clone(),
            cashier: draft.cashier.clone(),
            total_amount: draft.total_amount,
            payment_method: draft.payment_method,
            payment_status: draft.payment_status,
            order_status: draft.order_status,
            notes: draft.notes.clone(),
            created_at,
            items: draft.items.clone(),
        })
    }

    fn get_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderStoreError> {
        let conn = self.lock()?;

        let mut sql = String::from(
            "SELECT id, order_number, customer_id, customer_name, cashier, total_amount,
                    payment_method, payment_status, order_status, notes, created_at
             FROM orders WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(from) = filter.from {
            sql.push_str(&format!(" AND created_at >= ?{}", args.len() + 1));
            args.push(Box::new(from.to_rfc3339()));
        }
        if let Some(to) = filter.to {
            sql.push_str(&format!(" AND created_at <= ?{}", args.len() + 1));
            args.push(Box::new(to.to_rfc3339()));
        }
        if let Some(status) = filter.payment_status {
            sql.push_str(&format!(" AND payment_status = ?{}", args.len() + 1));
            args.push(Box::new(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt.query_map(params.as_slice(), map_order_row)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(finish_order(&conn, row?)?);
        }
        Ok(orders)
    }
}

/// Next order number for the day, assigned inside the insert transaction so
/// concurrent checkouts cannot collide.
fn next_order_number(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<String, OrderStoreError> {
    let date = now.format("%Y%m%d");
    let pattern = format!("{ORDER_NUMBER_PREFIX}-{date}-%");
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE order_number LIKE ?1",
        params![pattern],
        |row| row.get(0),
    )?;
    Ok(format!("{ORDER_NUMBER_PREFIX}-{date}-{:03}", count + 1))
}

fn map_order_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Order, String, String, String, String)> {
    let order = Order {
        id: row.get(0)?,
        order_number: row.get(1)?,
        customer_id: row.get(2)?,
        customer_name: row.get(3)?,
        cashier: row.get(4)?,
        total_amount: row.get(5)?,
        // placeholders, fixed up in finish_order from the raw strings
        payment_method: PaymentMethod::Cash,
        payment_status: PaymentStatus::Pending,
        order_status: OrderStatus::Pending,
        notes: row.get(9)?,
        created_at: Utc::now(),
        items: Vec::new(),
    };
    Ok((
        order,
        row.get::<_, String>(6)?,
        row.get::<_, String>(7)?,
        row.get::<_, String>(8)?,
        row.get::<_, String>(10)?,
    ))
}

/// Resolve enum columns, parse the timestamp, and attach items.
fn finish_order(
    conn: &Connection,
    (mut order, method, pay_status, ord_status, created_at): (
        Order,
        String,
        String,
        String,
        String,
    ),
) -> Result<Order, OrderStoreError> {
    order.payment_method = PaymentMethod::parse(&method)
        .ok_or_else(|| OrderStoreError::Corrupt(format!("payment_method: {method}")))?;
    order.payment_status = PaymentStatus::parse(&pay_status)
        .ok_or_else(|| OrderStoreError::Corrupt(format!("payment_status: {pay_status}")))?;
    order.order_status = OrderStatus::parse(&ord_status)
        .ok_or_else(|| OrderStoreError::Corrupt(format!("order_status: {ord_status}")))?;
    order.created_at = parse_timestamp(&created_at)?;

    let mut stmt = conn.prepare(
        "SELECT product_id, name, quantity, unit_price, total_price, options
         FROM order_items WHERE order_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![order.id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, u32>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    for row in rows {
        let (product_id, name, quantity, unit_price, total_price, options) = row?;
        let options: Vec<ItemOption> = serde_json::from_str(&options)
            .map_err(|e| OrderStoreError::Corrupt(format!("item options: {e}")))?;
        order.items.push(OrderItem {
            product_id,
            name,
            quantity,
            unit_price,
            total_price,
            options,
        });
    }

    Ok(order)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, OrderStoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OrderStoreError::Corrupt(format!("timestamp {value}: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
