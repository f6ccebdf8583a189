//! Database row types. These map directly to SQLite rows; the conversions
//! into `storefront_types` models live here so handlers never see raw
//! strings for ids, roles or timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use storefront_types::models::{
    CustomerSummary, Order, OrderItem, OrderStatus, Product, ProductSummary, Role, ShippingInfo,
    UserProfile,
};

use crate::{Result, StoreError};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image: String,
    pub stock: i64,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct OrderRow {
    pub id: String,
    pub user_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub total: f64,
    pub shipping: ShippingInfo,
    pub payment_method: String,
    pub status: String,
    pub created_at: String,
    pub items: Vec<OrderItemRow>,
}

#[derive(Debug)]
pub struct OrderItemRow {
    pub order_id: String,
    pub product_id: Option<String>,
    pub quantity: i64,
    pub price: f64,
    /// Joined from `products`; `None` when the product no longer exists.
    pub product: Option<ProductSummaryRow>,
}

#[derive(Debug)]
pub struct ProductSummaryRow {
    pub name: String,
    pub image: String,
    pub category: String,
    pub price: f64,
}

/// Checkout input handed to `Database::create_order`.
pub struct NewOrder {
    pub id: String,
    pub user_id: String,
    pub lines: Vec<(Uuid, i64)>,
    pub shipping: ShippingInfo,
    pub payment_method: String,
    pub created_at: String,
}

// -- Conversions --

/// Fixed-width RFC 3339 so that lexical order in SQL matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand in the sqlite shell use datetime('now').
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("id '{}': {}", raw, e)))
}

impl UserRow {
    pub fn role(&self) -> Result<Role> {
        self.role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {}", self.id, e)))
    }

    pub fn profile(&self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: parse_uuid(&self.id)?,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role()?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Product {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            price: row.price,
            category: row.category,
            image: row.image,
            stock: row.stock,
            sizes: row.sizes,
            colors: row.colors,
            vendor: row.vendor_id.as_deref().map(parse_uuid).transpose()?,
            vendor_name: row.vendor_name,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl OrderRow {
    /// Convert to the API model. `with_customer` adds the buyer's name and
    /// email, which only vendor listings expose.
    pub fn into_order(self, with_customer: bool) -> Result<Order> {
        let user = parse_uuid(&self.user_id)?;

        let customer = match (with_customer, self.customer_name, self.customer_email) {
            (true, Some(name), Some(email)) => Some(CustomerSummary { id: user, name, email }),
            _ => None,
        };

        let products = self
            .items
            .into_iter()
            .map(|item| {
                let product_id = item.product_id.as_deref().map(parse_uuid).transpose()?;
                let product = match (product_id, item.product) {
                    (Some(id), Some(p)) => Some(ProductSummary {
                        id,
                        name: p.name,
                        image: p.image,
                        category: p.category,
                        price: p.price,
                    }),
                    _ => None,
                };
                Ok(OrderItem {
                    product_id,
                    product,
                    quantity: item.quantity,
                    price: item.price,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Order {
            id: parse_uuid(&self.id)?,
            user,
            customer,
            products,
            total: self.total,
            shipping_info: self.shipping,
            payment_method: self.payment_method,
            status: self
                .status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::Corrupt(format!("order {}: {}", self.id, e)))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Round a money amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_lexically_in_time_order() {
        let early = format_timestamp("2024-01-01T00:00:00Z".parse().unwrap());
        let late = format_timestamp("2024-01-01T00:00:00.5Z".parse().unwrap());
        assert!(early < late);
        assert_eq!(early.len(), late.len());
    }

    #[test]
    fn parses_sqlite_datetime_format() {
        let ts = parse_timestamp("2024-03-05 10:11:12").unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-05T10:11:12.000000Z");
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(29.99 * 3.0), 89.97);
    }
}
