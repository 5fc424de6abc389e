use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::ApiError;

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();
    match response.extensions().get::<Result<(), ApiError>>() {
        Some(Ok(())) => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
        Some(Err(value)) if status.is_server_error() => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %value,
            "Failed to process request"
        ),
        Some(Err(value)) => warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %value,
            "Rejected request"
        ),
        None => warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request, but no Response extension is set"
        ),
    }

    response
}

pub fn to_response<T: IntoResponse>(
    response: T,               //The response that we are sending + StatusCode
    ext: Result<(), ApiError>, //The extension, that we want to give logging middleware
) -> Response {
    let mut response = response.into_response();

    response.extensions_mut().insert(ext);

    response
}
