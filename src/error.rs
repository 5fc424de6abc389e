use std::borrow::Cow;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

pub const CANT_CANCEL: &str = "Can't cancel this order";

const NON_FIELD: &str = "non_field_errors";

static PATH_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][\w.\[\]]*): (.*)$").unwrap());
static MISSING_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"missing field `([^`]+)`").unwrap());
static POSITION: Lazy<Regex> = Lazy::new(|| Regex::new(r" at line \d+ column \d+$").unwrap());

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Failed to validate: {0}")]
    Validation(ValidationErrors),
    #[error("Malformed request {field}: {message}")]
    Malformed { field: String, message: String },
    #[error("{0}")]
    ReferencedEntity(String),
    #[error("{}", CANT_CANCEL)]
    InvalidTransition,
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid or missing token")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Single field-level validation failure, shaped like the derive output.
    pub fn field(field: &'static str, code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, ValidationError::new(code).with_message(message.into()));
        ApiError::Validation(errors)
    }

    pub fn not_found(what: &str, id: i32) -> Self {
        ApiError::NotFound(format!("No {what} with {id} id was found."))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Malformed { .. }
            | ApiError::ReferencedEntity(_)
            | ApiError::InvalidTransition => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                let (field, message) = locate_failure(&err.body_text());
                ApiError::Malformed { field, message }
            }
            other => ApiError::Malformed {
                field: NON_FIELD.to_string(),
                message: other.body_text(),
            },
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        let (field, message) = locate_failure(&rejection.body_text());
        ApiError::Malformed { field, message }
    }
}

/// Splits a deserializer message into the offending field and a readable message.
///
/// `"...: items_sizes[0]: missing field `count` at line 1 column 9"` becomes
/// `("items_sizes[0].count", "missing field `count`")`.
fn locate_failure(body: &str) -> (String, String) {
    let detail = body.split_once(": ").map_or(body, |(_, detail)| detail);
    let (path, message) = match PATH_PREFIX.captures(detail) {
        Some(caps) => (Some(caps[1].to_string()), caps[2].to_string()),
        None => (None, detail.to_string()),
    };
    let message = POSITION.replace(&message, "").into_owned();

    let missing = MISSING_FIELD.captures(&message).map(|caps| caps[1].to_string());
    let field = match (path, missing) {
        (Some(path), Some(missing)) => format!("{path}.{missing}"),
        (Some(path), None) => path,
        (None, Some(missing)) => missing,
        (None, None) => NON_FIELD.to_string(),
    };
    (field, message)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Malformed { field, message } => json!({
                field.as_str(): [{ "code": "invalid", "message": message, "params": {} }]
            }),
            ApiError::ReferencedEntity(message) => json!({ "errors": message }),
            ApiError::InvalidTransition => json!({ "errors": CANT_CANCEL }),
            ApiError::Database(_) | ApiError::Internal(_) => {
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(Err::<(), ApiError>(self));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

    #[test]
    fn missing_top_level_field() {
        let body = format!("{PREFIX}missing field `address` at line 1 column 20");
        assert_eq!(
            locate_failure(&body),
            ("address".to_string(), "missing field `address`".to_string())
        );
    }

    #[test]
    fn nested_field_keeps_its_path() {
        let body = format!("{PREFIX}items_sizes[0]: missing field `count` at line 1 column 30");
        assert_eq!(locate_failure(&body).0, "items_sizes[0].count");

        let body = format!("{PREFIX}items_sizes[0].count: invalid type: string \"x\", expected i32 at line 1 column 40");
        assert_eq!(
            locate_failure(&body),
            (
                "items_sizes[0].count".to_string(),
                "invalid type: string \"x\", expected i32".to_string()
            )
        );
    }

    #[test]
    fn unplaceable_errors_are_non_field() {
        let body = format!("{PREFIX}invalid type: sequence, expected struct CreateOrder at line 1 column 1");
        assert_eq!(locate_failure(&body).0, NON_FIELD);
    }

    #[test]
    fn malformed_is_a_client_error() {
        let err = ApiError::Malformed {
            field: "address".to_string(),
            message: "missing field `address`".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
