use crate::entities::user::Entity as UserEntity;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return Err(ApiError::Unauthorized),
    };

    let claims = match validate_token(&state.db, token, &state.secret).await {
        Ok(claims) => claims,
        Err(AuthMiddlewareError::InternalServerError(err)) => {
            return Err(ApiError::Database(err));
        }
        Err(err) => {
            tracing::debug!("Rejected token: {err}");
            return Err(ApiError::Unauthorized);
        }
    };
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub secret: String,
}

pub fn generate_token(user_id: i32, secret: &str, ttl_hours: i64) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims { user_id, exp };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

pub async fn validate_token(
    db: &DatabaseConnection,
    token: &str,
    secret: &str,
) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthMiddlewareError::ValidationFail)?
    .claims;

    match UserEntity::find_by_id(claims.user_id).one(db).await {
        Ok(Some(_)) => Ok(claims),
        Ok(None) => Err(AuthMiddlewareError::InvalidUser),
        Err(err) => Err(AuthMiddlewareError::InternalServerError(err.to_string())),
    }
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Invalid user id")]
    InvalidUser,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}
