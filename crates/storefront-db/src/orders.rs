use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use storefront_types::models::{OrderStatus, ShippingInfo};

use crate::models::{NewOrder, OrderItemRow, OrderRow, ProductSummaryRow, round_cents};
use crate::{Database, Result, StoreError};

/// Who is changing an order's status.
#[derive(Debug, Clone, Copy)]
pub enum StatusChange<'a> {
    /// The customer who placed the order; may only cancel, and only early on.
    Owner(&'a str),
    /// A vendor; may set any status except reopening a cancelled order.
    Vendor,
}

const ORDER_SELECT: &str = "SELECT o.id, o.user_id, u.name, u.email, o.total,
        o.ship_full_name, o.ship_email, o.ship_phone, o.ship_address, o.ship_city,
        o.ship_state, o.ship_zip_code, o.ship_country, o.payment_method, o.status, o.created_at
     FROM orders o
     LEFT JOIN users u ON o.user_id = u.id";

impl Database {
    /// Place an order. Prices come from the catalogue, the total is computed
    /// here, and stock is decremented for every line. Any unknown product or
    /// short stock aborts the whole transaction.
    pub fn create_order(&self, order: &NewOrder) -> Result<OrderRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut priced = Vec::with_capacity(order.lines.len());
            let mut total = 0.0;
            for (product_id, quantity) in &order.lines {
                let pid = product_id.to_string();
                let (name, price, stock): (String, f64, i64) = tx
                    .query_row(
                        "SELECT name, price, stock FROM products WHERE id = ?1",
                        [&pid],
                        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                    )
                    .optional()?
                    .ok_or(StoreError::UnknownProduct(*product_id))?;

                // Re-read after earlier lines, so repeated products are checked cumulatively.
                if stock < *quantity {
                    return Err(StoreError::InsufficientStock {
                        name,
                        available: stock,
                        requested: *quantity,
                    });
                }
                tx.execute(
                    "UPDATE products SET stock = stock - ?1 WHERE id = ?2",
                    params![quantity, pid],
                )?;

                total += price * *quantity as f64;
                priced.push((pid, *quantity, price));
            }
            if !total.is_finite() {
                return Err(StoreError::TotalOutOfRange);
            }

            let s = &order.shipping;
            tx.execute(
                "INSERT INTO orders (id, user_id, total, ship_full_name, ship_email, ship_phone,
                    ship_address, ship_city, ship_state, ship_zip_code, ship_country,
                    payment_method, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    order.id,
                    order.user_id,
                    round_cents(total),
                    s.full_name,
                    s.email,
                    s.phone,
                    s.address,
                    s.city,
                    s.state,
                    s.zip_code,
                    s.country,
                    order.payment_method,
                    OrderStatus::Pending.as_str(),
                    order.created_at,
                ],
            )?;

            for (position, (pid, quantity, price)) in priced.iter().enumerate() {
                tx.execute(
                    "INSERT INTO order_items (order_id, position, product_id, quantity, price)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![order.id, position as i64, pid, quantity, price],
                )?;
            }

            let row = query_order(&tx, &order.id)?
                .ok_or_else(|| StoreError::Corrupt(format!("order {} vanished after insert", order.id)))?;
            tx.commit()?;

            info!(
                "Order {} placed by {}: {} lines, total {:.2}",
                order.id,
                order.user_id,
                priced.len(),
                row.total
            );
            Ok(row)
        })
    }

    pub fn get_order(&self, id: &str) -> Result<Option<OrderRow>> {
        self.with_conn(|conn| query_order(conn, id))
    }

    /// Orders placed by one user, newest first.
    pub fn get_orders_for_user(&self, user_id: &str) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE o.user_id = ?1 ORDER BY o.created_at DESC", ORDER_SELECT);
            query_orders(conn, &sql, [user_id])
        })
    }

    /// Every order in the store, newest first.
    pub fn get_all_orders(&self) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY o.created_at DESC", ORDER_SELECT);
            query_orders(conn, &sql, params![])
        })
    }

    /// Change an order's status. Returns `None` when the order does not
    /// exist, or belongs to someone else for `StatusChange::Owner`.
    /// Entering `cancelled` puts the ordered quantities back into stock.
    pub fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
        by: StatusChange<'_>,
    ) -> Result<Option<OrderRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current: Option<(String, String)> = tx
                .query_row("SELECT user_id, status FROM orders WHERE id = ?1", [id], |r| {
                    Ok((r.get(0)?, r.get(1)?))
                })
                .optional()?;
            let Some((owner_id, current)) = current else {
                return Ok(None);
            };
            let current: OrderStatus = current
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("order {}: {}", id, e)))?;

            match by {
                StatusChange::Owner(user_id) => {
                    if user_id != owner_id {
                        return Ok(None);
                    }
                    if status != OrderStatus::Cancelled || !current.is_cancellable_by_owner() {
                        return Err(StoreError::InvalidTransition { from: current, to: status });
                    }
                }
                StatusChange::Vendor => {
                    if current == OrderStatus::Cancelled && status != OrderStatus::Cancelled {
                        return Err(StoreError::InvalidTransition { from: current, to: status });
                    }
                }
            }

            if current != status {
                tx.execute(
                    "UPDATE orders SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id],
                )?;

                if status == OrderStatus::Cancelled {
                    let restocked = tx.execute(
                        "UPDATE products SET stock = stock + (
                             SELECT SUM(i.quantity) FROM order_items i
                             WHERE i.order_id = ?1 AND i.product_id = products.id)
                         WHERE id IN (SELECT product_id FROM order_items WHERE order_id = ?1)",
                        [id],
                    )?;
                    info!("Order {} cancelled, restocked {} products", id, restocked);
                } else {
                    info!("Order {} moved from {} to {}", id, current, status);
                }
            }

            let row = query_order(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }
}

fn query_order(conn: &Connection, id: &str) -> Result<Option<OrderRow>> {
    let sql = format!("{} WHERE o.id = ?1", ORDER_SELECT);
    Ok(query_orders(conn, &sql, [id])?.pop())
}

fn query_orders<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<OrderRow>> {
    let mut stmt = conn.prepare(sql)?;
    let mut orders = stmt
        .query_map(params, map_order)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if orders.is_empty() {
        return Ok(orders);
    }

    // Batch-fetch line items for all orders in one query instead of N+1.
    let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
    let mut items = query_items(conn, &ids)?;
    for order in &mut orders {
        order.items = items.remove(&order.id).unwrap_or_default();
    }
    Ok(orders)
}

fn query_items(conn: &Connection, order_ids: &[&str]) -> Result<HashMap<String, Vec<OrderItemRow>>> {
    let placeholders: Vec<String> = (1..=order_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT i.order_id, i.product_id, i.quantity, i.price, p.name, p.image, p.category, p.price
         FROM order_items i
         LEFT JOIN products p ON i.product_id = p.id
         WHERE i.order_id IN ({})
         ORDER BY i.order_id, i.position",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(order_ids.iter()), |row| {
            let name: Option<String> = row.get(4)?;
            let product = match name {
                Some(name) => Some(ProductSummaryRow {
                    name,
                    image: row.get(5)?,
                    category: row.get(6)?,
                    price: row.get(7)?,
                }),
                None => None,
            };
            Ok(OrderItemRow {
                order_id: row.get(0)?,
                product_id: row.get(1)?,
                quantity: row.get(2)?,
                price: row.get(3)?,
                product,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut grouped: HashMap<String, Vec<OrderItemRow>> = HashMap::new();
    for item in rows {
        grouped.entry(item.order_id.clone()).or_default().push(item);
    }
    Ok(grouped)
}

fn map_order(row: &Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        customer_name: row.get(2)?,
        customer_email: row.get(3)?,
        total: row.get(4)?,
        shipping: ShippingInfo {
            full_name: row.get(5)?,
            email: row.get(6)?,
            phone: row.get(7)?,
            address: row.get(8)?,
            city: row.get(9)?,
            state: row.get(10)?,
            zip_code: row.get(11)?,
            country: row.get(12)?,
        },
        payment_method: row.get(13)?,
        status: row.get(14)?,
        created_at: row.get(15)?,
        items: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductRow, UserRow, now_timestamp};
    use storefront_types::models::default_country;
    use uuid::Uuid;

    fn seed_user(db: &Database, email: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&UserRow {
            id: id.clone(),
            name: "Buyer".into(),
            email: email.into(),
            password: "hash".into(),
            role: "customer".into(),
            created_at: now_timestamp(),
        })
        .unwrap();
        id
    }

    fn seed_product(db: &Database, price: f64, stock: i64) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_product(&ProductRow {
            id: id.to_string(),
            name: "Hoodie".into(),
            description: "Warm".into(),
            price,
            category: "Hoodies".into(),
            image: "https://img.example/h.png".into(),
            stock,
            sizes: vec![],
            colors: vec![],
            vendor_id: None,
            vendor_name: None,
            created_at: now_timestamp(),
        })
        .unwrap();
        id
    }

    fn new_order(user_id: &str, lines: Vec<(Uuid, i64)>) -> NewOrder {
        NewOrder {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            lines,
            shipping: ShippingInfo {
                full_name: "Buyer".into(),
                email: "buyer@example.com".into(),
                phone: "555".into(),
                address: "1 Main St".into(),
                city: "Pune".into(),
                state: "MH".into(),
                zip_code: "411001".into(),
                country: default_country(),
            },
            payment_method: "cod".into(),
            created_at: now_timestamp(),
        }
    }

    fn stock_of(db: &Database, id: Uuid) -> i64 {
        db.get_product(&id.to_string()).unwrap().unwrap().stock
    }

    #[test]
    fn create_order_prices_lines_and_decrements_stock() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let tee = seed_product(&db, 29.99, 5);
        let jeans = seed_product(&db, 79.99, 2);

        let row = db.create_order(&new_order(&user, vec![(tee, 3), (jeans, 1)])).unwrap();

        assert_eq!(row.total, 169.96);
        assert_eq!(row.items.len(), 2);
        assert_eq!(row.items[0].price, 29.99);
        assert_eq!(row.status, "pending");
        assert_eq!(stock_of(&db, tee), 2);
        assert_eq!(stock_of(&db, jeans), 1);
    }

    #[test]
    fn short_stock_rejects_whole_order() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let tee = seed_product(&db, 10.0, 5);
        let scarce = seed_product(&db, 10.0, 1);

        let err = db.create_order(&new_order(&user, vec![(tee, 2), (scarce, 2)])).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { available: 1, requested: 2, .. }));

        assert_eq!(stock_of(&db, tee), 5);
        assert!(db.get_orders_for_user(&user).unwrap().is_empty());
    }

    #[test]
    fn repeated_lines_are_checked_cumulatively() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let tee = seed_product(&db, 10.0, 3);

        let err = db.create_order(&new_order(&user, vec![(tee, 2), (tee, 2)])).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { .. }));
        assert_eq!(stock_of(&db, tee), 3);
    }

    #[test]
    fn overflowing_total_is_rejected_without_touching_stock() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let gold = seed_product(&db, 1e308, 1000);

        let err = db.create_order(&new_order(&user, vec![(gold, 1000)])).unwrap_err();
        assert!(matches!(err, StoreError::TotalOutOfRange));
        assert_eq!(stock_of(&db, gold), 1000);
        assert!(db.get_orders_for_user(&user).unwrap().is_empty());
    }

    #[test]
    fn unknown_product_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let ghost = Uuid::new_v4();

        let err = db.create_order(&new_order(&user, vec![(ghost, 1)])).unwrap_err();
        assert!(matches!(err, StoreError::UnknownProduct(id) if id == ghost));
    }

    #[test]
    fn orders_are_scoped_to_their_owner() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice@example.com");
        let bob = seed_user(&db, "bob@example.com");
        let tee = seed_product(&db, 10.0, 10);

        db.create_order(&new_order(&alice, vec![(tee, 1)])).unwrap();

        assert_eq!(db.get_orders_for_user(&alice).unwrap().len(), 1);
        assert!(db.get_orders_for_user(&bob).unwrap().is_empty());
        assert_eq!(db.get_all_orders().unwrap().len(), 1);
    }

    #[test]
    fn cancellation_restocks_and_is_terminal() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let tee = seed_product(&db, 10.0, 4);
        let order = db.create_order(&new_order(&user, vec![(tee, 3)])).unwrap();
        assert_eq!(stock_of(&db, tee), 1);

        let cancelled = db
            .update_order_status(&order.id, OrderStatus::Cancelled, StatusChange::Owner(&user))
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, "cancelled");
        assert_eq!(stock_of(&db, tee), 4);

        // Setting cancelled again is a no-op and must not restock twice.
        db.update_order_status(&order.id, OrderStatus::Cancelled, StatusChange::Vendor)
            .unwrap();
        assert_eq!(stock_of(&db, tee), 4);

        let err = db
            .update_order_status(&order.id, OrderStatus::Processing, StatusChange::Vendor)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn owner_cannot_cancel_shipped_or_foreign_orders() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let stranger = seed_user(&db, "b@example.com");
        let tee = seed_product(&db, 10.0, 4);
        let order = db.create_order(&new_order(&user, vec![(tee, 1)])).unwrap();

        assert!(db
            .update_order_status(&order.id, OrderStatus::Cancelled, StatusChange::Owner(&stranger))
            .unwrap()
            .is_none());

        db.update_order_status(&order.id, OrderStatus::Shipped, StatusChange::Vendor)
            .unwrap();
        let err = db
            .update_order_status(&order.id, OrderStatus::Cancelled, StatusChange::Owner(&user))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Cancelled }
        ));
    }

    #[test]
    fn deleted_product_leaves_line_without_summary() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, "a@example.com");
        let tee = seed_product(&db, 12.5, 4);
        let order = db.create_order(&new_order(&user, vec![(tee, 2)])).unwrap();

        db.replace_catalog(&[]).unwrap();

        let row = db.get_order(&order.id).unwrap().unwrap();
        assert_eq!(row.items.len(), 1);
        assert!(row.items[0].product_id.is_none());
        assert!(row.items[0].product.is_none());
        assert_eq!(row.items[0].price, 12.5);
    }
}
