use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, products, orders)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'customer',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE products (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                price       REAL NOT NULL,
                category    TEXT NOT NULL,
                image       TEXT NOT NULL,
                stock       INTEGER NOT NULL DEFAULT 0,
                sizes       TEXT NOT NULL DEFAULT '[]',
                colors      TEXT NOT NULL DEFAULT '[]',
                vendor_id   TEXT REFERENCES users(id),
                vendor_name TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_products_vendor ON products(vendor_id);
            CREATE INDEX idx_products_category ON products(category);

            CREATE TABLE orders (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                total           REAL NOT NULL,
                ship_full_name  TEXT NOT NULL,
                ship_email      TEXT NOT NULL,
                ship_phone      TEXT NOT NULL,
                ship_address    TEXT NOT NULL,
                ship_city       TEXT NOT NULL,
                ship_state      TEXT NOT NULL,
                ship_zip_code   TEXT NOT NULL,
                ship_country    TEXT NOT NULL,
                payment_method  TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending',
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_orders_user ON orders(user_id, created_at);

            CREATE TABLE order_items (
                order_id    TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                product_id  TEXT REFERENCES products(id) ON DELETE SET NULL,
                quantity    INTEGER NOT NULL,
                price       REAL NOT NULL,
                PRIMARY KEY (order_id, position)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
