use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::info;

use storefront_types::api::UpdateProductRequest;
use storefront_types::models::Role;

use crate::error::is_constraint_violation;
use crate::models::{ProductRow, UserRow};
use crate::{Database, Result, StoreError};

/// Which products a caller may mutate.
#[derive(Debug, Clone, Copy)]
pub enum ProductScope<'a> {
    /// Only products owned by this vendor id.
    OwnedBy(&'a str),
    /// Products owned by this vendor id, or catalogue items with no owner.
    OwnedByOrUnowned(&'a str),
}

impl ProductScope<'_> {
    fn permits(&self, vendor_id: Option<&str>) -> bool {
        match (self, vendor_id) {
            (Self::OwnedBy(me) | Self::OwnedByOrUnowned(me), Some(owner)) => *me == owner,
            (Self::OwnedByOrUnowned(_), None) => true,
            (Self::OwnedBy(_), None) => false,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub vendor_id: Option<String>,
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, image, stock, sizes, colors, vendor_id, vendor_name, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user.id, user.name, user.email, user.password, user.role, user.created_at],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::DuplicateEmail
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn count_users_with_email(&self, email: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users WHERE email = ?1", [email], |r| r.get(0))?)
        })
    }

    /// Returns the updated user, or `None` if no account has that email.
    pub fn set_user_role(&self, email: &str, role: Role) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?1 WHERE email = ?2",
                params![role.as_str(), email],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            info!("Role for {} set to {}", email, role);
            query_user(conn, "email", email)
        })
    }

    // -- Products --

    pub fn insert_product(&self, product: &ProductRow) -> Result<()> {
        self.with_conn(|conn| insert_product(conn, product))
    }

    pub fn get_product(&self, id: &str) -> Result<Option<ProductRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
            Ok(conn.query_row(&sql, [id], map_product).optional()?)
        })
    }

    /// Newest first. Search is a case-insensitive substring match on name or description.
    pub fn list_products(&self, filter: &ProductFilter) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {} FROM products WHERE 1 = 1", PRODUCT_COLUMNS);
            let mut args: Vec<String> = Vec::new();

            if let Some(category) = &filter.category {
                args.push(category.clone());
                sql.push_str(&format!(" AND category = ?{}", args.len()));
            }
            if let Some(vendor_id) = &filter.vendor_id {
                args.push(vendor_id.clone());
                sql.push_str(&format!(" AND vendor_id = ?{}", args.len()));
            }
            if let Some(search) = &filter.search {
                args.push(format!("%{}%", escape_like(&search.to_lowercase())));
                let n = args.len();
                sql.push_str(&format!(
                    " AND (unicode_lower(name) LIKE ?{n} ESCAPE '\\' OR unicode_lower(description) LIKE ?{n} ESCAPE '\\')"
                ));
            }
            sql.push_str(" ORDER BY created_at DESC, id");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), map_product)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a partial update. Returns `None` if the product does not exist
    /// or `scope` does not allow the caller to touch it.
    pub fn update_product(
        &self,
        id: &str,
        scope: ProductScope<'_>,
        patch: &UpdateProductRequest,
    ) -> Result<Option<ProductRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
            let Some(mut product) = tx.query_row(&sql, [id], map_product).optional()? else {
                return Ok(None);
            };
            if !scope.permits(product.vendor_id.as_deref()) {
                return Ok(None);
            }

            if let Some(v) = &patch.name {
                product.name = v.clone();
            }
            if let Some(v) = &patch.description {
                product.description = v.clone();
            }
            if let Some(v) = patch.price {
                product.price = v;
            }
            if let Some(v) = &patch.category {
                product.category = v.clone();
            }
            if let Some(v) = &patch.image {
                product.image = v.clone();
            }
            if let Some(v) = patch.stock {
                product.stock = v;
            }
            if let Some(v) = &patch.sizes {
                product.sizes = v.clone();
            }
            if let Some(v) = &patch.colors {
                product.colors = v.clone();
            }

            tx.execute(
                "UPDATE products SET name = ?1, description = ?2, price = ?3, category = ?4, image = ?5,
                 stock = ?6, sizes = ?7, colors = ?8 WHERE id = ?9",
                params![
                    product.name,
                    product.description,
                    product.price,
                    product.category,
                    product.image,
                    product.stock,
                    serde_json::to_string(&product.sizes)?,
                    serde_json::to_string(&product.colors)?,
                    product.id,
                ],
            )?;
            tx.commit()?;
            Ok(Some(product))
        })
    }

    /// Returns false if the product does not exist or `scope` forbids it.
    pub fn delete_product(&self, id: &str, scope: ProductScope<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let owner: Option<Option<String>> = tx
                .query_row("SELECT vendor_id FROM products WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;
            match owner {
                Some(vendor_id) if scope.permits(vendor_id.as_deref()) => {
                    tx.execute("DELETE FROM products WHERE id = ?1", [id])?;
                    tx.commit()?;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    pub fn count_products(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?))
    }

    /// Drop the whole catalogue and insert `products` in one transaction.
    /// Order lines that referenced removed products keep their price and
    /// quantity but lose the product link.
    pub fn replace_catalog(&self, products: &[ProductRow]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM products", [])?;
            for product in products {
                insert_product(&tx, product)?;
            }
            tx.commit()?;
            info!("Catalog replaced: {} removed, {} inserted", removed, products.len());
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never user input.
    let sql = format!(
        "SELECT id, name, email, password, role, created_at FROM users WHERE {} = ?1",
        column
    );
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                role: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn insert_product(conn: &Connection, product: &ProductRow) -> Result<()> {
    conn.execute(
        "INSERT INTO products (id, name, description, price, category, image, stock, sizes, colors, vendor_id, vendor_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            product.id,
            product.name,
            product.description,
            product.price,
            product.category,
            product.image,
            product.stock,
            serde_json::to_string(&product.sizes)?,
            serde_json::to_string(&product.colors)?,
            product.vendor_id,
            product.vendor_name,
            product.created_at,
        ],
    )?;
    Ok(())
}

fn map_product(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
        image: row.get(5)?,
        stock: row.get(6)?,
        sizes: json_list(row, 7)?,
        colors: json_list(row, 8)?,
        vendor_id: row.get(9)?,
        vendor_name: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
