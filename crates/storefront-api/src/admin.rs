use axum::{Json, extract::State, response::IntoResponse};
use tracing::info;

use storefront_db::seed::sample_products;
use storefront_types::api::{HealthResponse, MessageResponse, RoleUpdateRequest, RoleUpdateResponse};
use storefront_types::models::Role;

use crate::auth::normalize_email;
use crate::error::JsonBody;
use crate::{AppState, ApiError, run_db};

/// POST /admin/user-role: promote or demote an account by email.
pub async fn update_user_role(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RoleUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(role)) = (req.email, req.role) else {
        return Err(ApiError::bad_request("Email and role are required"));
    };
    let email = normalize_email(&email);
    let role: Role = role
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid role '{}'", role)))?;

    let user = run_db(&state, move |db| db.set_user_role(&email, role))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(RoleUpdateResponse {
        message: "User role updated successfully".into(),
        user: user.profile()?,
    }))
}

/// POST /admin/seed-products: replace the catalogue with the sample set.
pub async fn seed_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = sample_products();
    let count = products.len();
    run_db(&state, move |db| db.replace_catalog(&products)).await?;

    info!("Seeded {} sample products", count);
    Ok(Json(MessageResponse::new("Sample products seeded successfully")))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        message: "API is working".into(),
        timestamp: chrono::Utc::now(),
    })
}
