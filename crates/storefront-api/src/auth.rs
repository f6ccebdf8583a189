use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::{info, warn};
use uuid::Uuid;

use storefront_db::models::{UserRow, now_timestamp};
use storefront_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use storefront_types::models::{Role, UserProfile};

use crate::error::JsonBody;
use crate::{AppState, ApiError, blocking, run_db};

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    let role = req.role.unwrap_or_default();

    if name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    if !looks_like_email(&email) {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // Fast path; the UNIQUE constraint still catches a concurrent duplicate.
    let lookup = email.clone();
    if run_db(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let user_id = Uuid::new_v4();
    let row = UserRow {
        id: user_id.to_string(),
        name: name.clone(),
        email: email.clone(),
        password: password_hash,
        role: role.as_str().to_string(),
        created_at: now_timestamp(),
    };
    run_db(&state, move |db| db.create_user(&row)).await?;

    let token = create_token(&state.jwt_secret, user_id, &email, role, state.token_ttl)
        .map_err(|e| ApiError::Internal(format!("token signing: {}", e)))?;

    info!("Registered {} as {}", email, role);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".into(),
            token,
            user: UserProfile {
                id: user_id,
                name,
                email,
                role,
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    let lookup = email.clone();
    let Some(user) = run_db(&state, move |db| db.get_user_by_email(&lookup)).await? else {
        return Err(invalid_credentials());
    };

    let stored = user.password.clone();
    let password = req.password;
    let valid = blocking(move || verify_password(&password, &stored)).await?;
    if !valid {
        warn!("Failed login for {}", email);
        return Err(invalid_credentials());
    }

    let profile = user.profile().map_err(ApiError::Store)?;
    let token = create_token(&state.jwt_secret, profile.id, &profile.email, profile.role, state.token_ttl)
        .map_err(|e| ApiError::Internal(format!("token signing: {}", e)))?;

    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token,
        user: profile,
    }))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    email: &str,
    role: Role,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Argon2id with a fresh random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing: {}", e)))
}

fn verify_password(password: &str, phc: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| ApiError::Internal(format!("stored hash unreadable: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn invalid_credentials() -> ApiError {
    ApiError::bad_request("Invalid credentials")
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
