use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use storefront_db::models::{ProductRow, now_timestamp};
use storefront_db::queries::{ProductFilter, ProductScope};
use storefront_types::api::{CreateProductRequest, MessageResponse, ProductQuery, UpdateProductRequest};
use storefront_types::models::Product;

use crate::error::{JsonBody, parse_id};
use crate::middleware::VendorIdentity;
use crate::{AppState, ApiError, run_db};

/// Keeps `price * quantity` summed over an order well inside `f64` range.
const MAX_PRICE: f64 = 10_000_000.0;

/// GET /products: public catalogue, newest first.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ProductFilter {
        category: non_blank(query.category),
        search: non_blank(query.search),
        vendor_id: None,
    };
    let rows = run_db(&state, move |db| db.list_products(&filter)).await?;
    Ok(Json(to_products(rows)?))
}

/// GET /products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?.to_string();
    let row = run_db(&state, move |db| db.get_product(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(Product::try_from(row)?))
}

/// POST /products and POST /vendor/products: the new product belongs to the caller.
pub async fn create_product(
    State(state): State<AppState>,
    Extension(vendor): Extension<VendorIdentity>,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_new(&req)?;

    let row = ProductRow {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        price: req.price,
        category: req.category.trim().to_string(),
        image: req.image.trim().to_string(),
        stock: req.stock,
        sizes: req.sizes,
        colors: req.colors,
        vendor_id: Some(vendor.id.to_string()),
        vendor_name: Some(vendor.name.clone()),
        created_at: now_timestamp(),
    };

    let stored = row.clone();
    run_db(&state, move |db| db.insert_product(&stored)).await?;
    info!("Vendor {} listed product {} ({})", vendor.name, row.id, row.name);

    Ok((StatusCode::CREATED, Json(Product::try_from(row)?)))
}

/// PUT /products/{id}: allowed on the caller's own products and on unowned catalogue items.
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(vendor): Extension<VendorIdentity>,
    JsonBody(patch): JsonBody<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?;
    apply_update(&state, id, &vendor, false, patch)
        .await
        .map(Json)
}

/// DELETE /products/{id}: same ownership rule as update.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(vendor): Extension<VendorIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?;
    apply_delete(&state, id, &vendor, false).await.map(Json)
}

// -- Shared with the vendor routes --

/// `owned_only` selects `ProductScope::OwnedBy`; otherwise unowned items are editable too.
pub(crate) async fn apply_update(
    state: &AppState,
    id: Uuid,
    vendor: &VendorIdentity,
    owned_only: bool,
    patch: UpdateProductRequest,
) -> Result<Product, ApiError> {
    validate_patch(&patch)?;
    let patch = trim_patch(patch);

    let vendor_id = vendor.id.to_string();
    let row = run_db(state, move |db| {
        let scope = scope_for(&vendor_id, owned_only);
        db.update_product(&id.to_string(), scope, &patch)
    })
    .await?
    .ok_or_else(not_found_or_denied)?;

    info!("Vendor {} updated product {}", vendor.name, id);
    Ok(Product::try_from(row)?)
}

pub(crate) async fn apply_delete(
    state: &AppState,
    id: Uuid,
    vendor: &VendorIdentity,
    owned_only: bool,
) -> Result<MessageResponse, ApiError> {
    let vendor_id = vendor.id.to_string();
    let deleted = run_db(state, move |db| {
        db.delete_product(&id.to_string(), scope_for(&vendor_id, owned_only))
    })
    .await?;

    if !deleted {
        return Err(not_found_or_denied());
    }
    info!("Vendor {} deleted product {}", vendor.name, id);
    Ok(MessageResponse::new("Product deleted successfully"))
}

pub(crate) fn to_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, ApiError> {
    rows.into_iter()
        .map(|row| Product::try_from(row).map_err(ApiError::Store))
        .collect()
}

fn scope_for(vendor_id: &str, owned_only: bool) -> ProductScope<'_> {
    if owned_only {
        ProductScope::OwnedBy(vendor_id)
    } else {
        ProductScope::OwnedByOrUnowned(vendor_id)
    }
}

fn not_found_or_denied() -> ApiError {
    ApiError::not_found("Product not found or access denied")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_new(req: &CreateProductRequest) -> Result<(), ApiError> {
    for (field, value) in [
        ("name", &req.name),
        ("description", &req.description),
        ("category", &req.category),
        ("image", &req.image),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::bad_request(format!("Product {} is required", field)));
        }
    }
    validate_numbers(Some(req.price), Some(req.stock))
}

fn validate_patch(patch: &UpdateProductRequest) -> Result<(), ApiError> {
    for (field, value) in [
        ("name", &patch.name),
        ("description", &patch.description),
        ("category", &patch.category),
        ("image", &patch.image),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ApiError::bad_request(format!("Product {} cannot be empty", field)));
        }
    }
    validate_numbers(patch.price, patch.stock)
}

fn validate_numbers(price: Option<f64>, stock: Option<i64>) -> Result<(), ApiError> {
    if price.is_some_and(|p| !p.is_finite() || p < 0.0) {
        return Err(ApiError::bad_request("Price must be a non-negative number"));
    }
    if price.is_some_and(|p| p > MAX_PRICE) {
        return Err(ApiError::bad_request(format!("Price cannot exceed {}", MAX_PRICE)));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(ApiError::bad_request("Stock cannot be negative"));
    }
    Ok(())
}

fn trim_patch(mut patch: UpdateProductRequest) -> UpdateProductRequest {
    for field in [
        &mut patch.name,
        &mut patch.description,
        &mut patch.category,
        &mut patch.image,
    ] {
        if let Some(v) = field {
            *v = v.trim().to_string();
        }
    }
    patch
}
