use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::ServiceError;

/// JSON response with the given status
pub fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(payload)?.into())
        .map_err(Box::new)?)
}

/// Map a service error onto `{"error": "..."}` with its status code
pub fn error_response(err: &ServiceError) -> Result<Response<Body>, Error> {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::warn!("Request rejected ({}): {}", status.as_u16(), err);
    }

    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json");

    if let ServiceError::RateLimited { retry_after_secs, .. } = err {
        builder = builder.header("Retry-After", retry_after_secs.to_string());
    }

    Ok(builder
        .body(serde_json::json!({"error": err.to_string()}).to_string().into())
        .map_err(Box::new)?)
}

/// Collapse a service result into a response: `Ok` as JSON with `status`, `Err` via [`error_response`]
pub fn respond<T: Serialize>(
    result: Result<T, ServiceError>,
    status: StatusCode,
) -> Result<Response<Body>, Error> {
    match result {
        Ok(payload) => json_response(status, &payload),
        Err(e) => error_response(&e),
    }
}

pub fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "application/json")
        .body(
            serde_json::json!({"error": "Method not allowed"})
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}
