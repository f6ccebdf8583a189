//! Vendor dashboard routes. All of them sit behind `require_auth` and
//! `require_vendor`, so every handler receives a `VendorIdentity`.
//!
//! The mutating routes accept the id either as a path segment or as `?id=`,
//! matching both forms the storefront client has used.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::info;

use storefront_db::orders::StatusChange;
use storefront_db::queries::ProductFilter;
use storefront_types::api::{IdQuery, StatusUpdateRequest, UpdateProductRequest};

use crate::error::{JsonBody, parse_id};
use crate::middleware::VendorIdentity;
use crate::orders::{parse_status, to_orders};
use crate::products::{apply_delete, apply_update, to_products};
use crate::{AppState, ApiError, run_db};

/// GET /vendor/products: only the caller's listings.
pub async fn list_products(
    State(state): State<AppState>,
    Extension(vendor): Extension<VendorIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ProductFilter {
        vendor_id: Some(vendor.id.to_string()),
        ..Default::default()
    };
    let rows = run_db(&state, move |db| db.list_products(&filter)).await?;
    Ok(Json(to_products(rows)?))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(vendor): Extension<VendorIdentity>,
    JsonBody(patch): JsonBody<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?;
    apply_update(&state, id, &vendor, true, patch).await.map(Json)
}

pub async fn update_product_by_query(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Extension(vendor): Extension<VendorIdentity>,
    JsonBody(patch): JsonBody<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query_id(query, "Product")?;
    let id = parse_id(&id, "Product")?;
    apply_update(&state, id, &vendor, true, patch).await.map(Json)
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(vendor): Extension<VendorIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Product")?;
    apply_delete(&state, id, &vendor, true).await.map(Json)
}

pub async fn delete_product_by_query(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Extension(vendor): Extension<VendorIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query_id(query, "Product")?;
    let id = parse_id(&id, "Product")?;
    apply_delete(&state, id, &vendor, true).await.map(Json)
}

/// GET /vendor/orders: every order, newest first, with the buyer attached.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(_vendor): Extension<VendorIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.get_all_orders()).await?;
    Ok(Json(to_orders(rows, true)?))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(vendor): Extension<VendorIdentity>,
    JsonBody(req): JsonBody<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    set_order_status(&state, &id, &vendor, req).await
}

pub async fn update_order_by_query(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Extension(vendor): Extension<VendorIdentity>,
    JsonBody(req): JsonBody<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query_id(query, "Order")?;
    set_order_status(&state, &id, &vendor, req).await
}

async fn set_order_status(
    state: &AppState,
    id: &str,
    vendor: &VendorIdentity,
    req: StatusUpdateRequest,
) -> Result<Json<storefront_types::models::Order>, ApiError> {
    let id = parse_id(id, "Order")?.to_string();
    let status = parse_status(req.status)?;

    let row = run_db(state, move |db| db.update_order_status(&id, status, StatusChange::Vendor))
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    info!("Vendor {} set order {} to {}", vendor.name, row.id, status);
    Ok(Json(row.into_order(true)?))
}

fn query_id(query: IdQuery, what: &str) -> Result<String, ApiError> {
    query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} ID is required", what)))
}
