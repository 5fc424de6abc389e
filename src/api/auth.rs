use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use axum::{extract::Extension, http::StatusCode, response::Response, routing::post, Json, Router};
use chrono::Utc;
use rand::rngs::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::extract::Payload;
use crate::config::Config;
use crate::entities::user::{self, Entity as UserEntity};
use crate::error::ApiError;
use crate::middleware::auth::generate_token;
use crate::middleware::logging::to_response;

pub fn auth_router(db: Arc<DatabaseConnection>, config: Arc<Config>) -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login))
        .layer(Extension(db))
        .layer(Extension(config))
}

async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Payload(payload): Payload<CreateUser>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    tracing::info!("Registering user {}", payload.username);

    let txn = db.begin().await?;

    let taken = UserEntity::find()
        .filter(user::Column::Username.eq(&*payload.username))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(ApiError::field(
            "username",
            "unique",
            "A user with that username already exists.",
        ));
    }

    let password = hash_password(&payload.password)?;

    let new_user = user::ActiveModel {
        username: Set(payload.username),
        password: Set(password),
        name: Set(payload.name.unwrap_or_default()),
        address: Set(payload.address.unwrap_or_default()),
        created: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok(to_response(
        (
            StatusCode::CREATED,
            Json(json!({
                "id": new_user.id,
                "username": new_user.username,
            })),
        ),
        Ok(()),
    ))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Payload(payload): Payload<UserLogin>,
) -> Result<Response, ApiError> {
    let found = UserEntity::find()
        .filter(user::Column::Username.eq(&*payload.username))
        .one(&*db)
        .await?;

    let Some(model) = found else {
        return Err(ApiError::Unauthorized);
    };
    if model.check_hash(&payload.password).is_err() {
        return Err(ApiError::Unauthorized);
    }

    let token = generate_token(model.id, &config.secret, config.token_ttl_hours)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(to_response(
        (StatusCode::OK, Json(json!({ "token": token }))),
        Ok(()),
    ))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("Failed to hash password {err}")))
}

#[derive(Deserialize, Validate, Debug)]
struct CreateUser {
    #[validate(length(min = 3, max = 150))]
    username: String,
    #[validate(length(min = 8))]
    password: String,
    #[validate(length(max = 128))]
    name: Option<String>,
    #[validate(length(max = 128))]
    address: Option<String>,
}

#[derive(Deserialize)]
struct UserLogin {
    username: String,
    password: String,
}
