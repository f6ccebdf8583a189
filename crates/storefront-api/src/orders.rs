use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use storefront_db::models::{NewOrder, OrderRow, now_timestamp};
use storefront_db::orders::StatusChange;
use storefront_types::api::{Claims, CreateOrderRequest, StatusUpdateRequest};
use storefront_types::models::{Order, OrderStatus, ShippingInfo};

use crate::error::{JsonBody, parse_id};
use crate::{AppState, ApiError, run_db};

/// Upper bound on a single line's quantity.
const MAX_LINE_QUANTITY: i64 = 1_000;

/// GET /orders: only the caller's own orders.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.get_orders_for_user(&uid)).await?;
    Ok(Json(to_orders(rows, false)?))
}

/// POST /orders: checkout. Line prices and the total are computed from the
/// catalogue, and stock is reserved in the same transaction.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.products.is_empty() {
        return Err(ApiError::bad_request("Order must contain at least one product"));
    }
    if let Some(line) = req
        .products
        .iter()
        .find(|l| l.quantity < 1 || l.quantity > MAX_LINE_QUANTITY)
    {
        return Err(ApiError::bad_request(format!(
            "Quantity for product {} must be between 1 and {}",
            line.product, MAX_LINE_QUANTITY
        )));
    }
    let shipping = validate_shipping(req.shipping_info)?;
    let payment_method = req.payment_method.trim().to_string();
    if payment_method.is_empty() {
        return Err(ApiError::bad_request("Payment method is required"));
    }

    let order = NewOrder {
        id: Uuid::new_v4().to_string(),
        user_id: claims.sub.to_string(),
        lines: req.products.iter().map(|l| (l.product, l.quantity)).collect(),
        shipping,
        payment_method,
        created_at: now_timestamp(),
    };
    let row = run_db(&state, move |db| db.create_order(&order)).await?;

    Ok((StatusCode::CREATED, Json(row.into_order(false)?)))
}

/// PUT /orders/{id}: the customer may cancel their own order while it has
/// not shipped yet.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "Order")?.to_string();
    let status = parse_status(req.status)?;

    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.update_order_status(&id, status, StatusChange::Owner(&uid))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Order not found"))?;

    info!("Order {} set to {} by its owner {}", row.id, status, claims.email);
    Ok(Json(row.into_order(false)?))
}

pub(crate) fn parse_status(raw: Option<String>) -> Result<OrderStatus, ApiError> {
    let raw = raw
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Status is required"))?;
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid status '{}'", raw)))
}

pub(crate) fn to_orders(rows: Vec<OrderRow>, with_customer: bool) -> Result<Vec<Order>, ApiError> {
    rows.into_iter()
        .map(|row| row.into_order(with_customer).map_err(ApiError::Store))
        .collect()
}

fn validate_shipping(mut info: ShippingInfo) -> Result<ShippingInfo, ApiError> {
    for (field, value) in [
        ("fullName", &mut info.full_name),
        ("email", &mut info.email),
        ("phone", &mut info.phone),
        ("address", &mut info.address),
        ("city", &mut info.city),
        ("state", &mut info.state),
        ("zipCode", &mut info.zip_code),
    ] {
        *value = value.trim().to_string();
        if value.is_empty() {
            return Err(ApiError::bad_request(format!("Shipping {} is required", field)));
        }
    }
    info.country = info.country.trim().to_string();
    if info.country.is_empty() {
        info.country = storefront_types::models::default_country();
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_required_and_case_insensitive() {
        assert!(parse_status(None).is_err());
        assert!(parse_status(Some("  ".into())).is_err());
        assert_eq!(parse_status(Some("Shipped".into())).unwrap(), OrderStatus::Shipped);
        assert_eq!(
            parse_status(Some("lost".into())).unwrap_err().to_string(),
            "Invalid status 'lost'"
        );
    }

    #[test]
    fn shipping_requires_every_field() {
        let info = ShippingInfo {
            full_name: "A".into(),
            email: "a@b.co".into(),
            phone: "1".into(),
            address: "x".into(),
            city: " ".into(),
            state: "s".into(),
            zip_code: "0".into(),
            country: "".into(),
        };
        assert_eq!(
            validate_shipping(info.clone()).unwrap_err().to_string(),
            "Shipping city is required"
        );

        let fixed = validate_shipping(ShippingInfo { city: "Pune".into(), ..info }).unwrap();
        assert_eq!(fixed.country, "India");
    }
}
