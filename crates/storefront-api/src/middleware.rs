use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, warn};
use uuid::Uuid;

use storefront_db::models::UserRow;
use storefront_types::api::Claims;
use storefront_types::models::Role;

use crate::{AppState, ApiError, run_db};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// The authenticated caller, after the store confirmed the vendor role.
#[derive(Debug, Clone)]
pub struct VendorIdentity {
    pub id: Uuid,
    pub name: String,
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Extract and validate the JWT from the Authorization header, then expose
/// its claims to handlers as `Extension<Claims>`. The account is loaded from
/// the store on every request; a token for an account that no longer exists
/// is rejected like a bad signature.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized("Access token required".into()))?;

    let claims = decode_token(&state.jwt_secret, bearer.token()).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized("Invalid token".into())
    })?;

    let uid = claims.sub.to_string();
    let Some(user) = run_db(&state, move |db| db.get_user_by_id(&uid)).await? else {
        warn!("Token for unknown account {} ({})", claims.sub, claims.email);
        return Err(ApiError::Unauthorized("Invalid token".into()));
    };

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Gate on the vendor role. Must sit inside `require_auth`, which has just
/// read the account from the store, so the token's own `role` claim is never
/// trusted and a role change applies without re-login.
pub async fn require_vendor(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<UserRow>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("Access token required".into()))?;

    let profile = user.profile().map_err(ApiError::Store)?;
    if profile.role != Role::Vendor {
        warn!("Vendor access denied for {}", profile.email);
        return Err(ApiError::Forbidden("Vendor access required".into()));
    }

    req.extensions_mut().insert(VendorIdentity {
        id: profile.id,
        name: profile.name,
    });
    Ok(next.run(req).await)
}

/// Operator-only routes. With no key configured they do not exist.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_key.as_deref() else {
        return Err(ApiError::not_found("Not found"));
    };

    let presented = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if presented != Some(expected) {
        warn!("Admin route called with missing or wrong key");
        return Err(ApiError::Unauthorized("Admin key required".into()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;

    #[test]
    fn token_roundtrip_keeps_claims() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "a@example.com", Role::Vendor, chrono::Duration::hours(1)).unwrap();

        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.role, Role::Vendor);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "a@example.com", Role::Customer, chrono::Duration::hours(1)).unwrap();
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Beyond the default 60s leeway.
        let token = create_token("secret", Uuid::new_v4(), "a@example.com", Role::Customer, chrono::Duration::hours(-1)).unwrap();
        assert!(decode_token("secret", &token).is_err());
    }
}
