use anyhow::Result;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};
use validator::Validate;

use crate::errors::{classify, AppError};

fn report(err: anyhow::Error) -> AppError {
    let app = classify(err);
    match &app {
        AppError::Internal(msg) => error!(code = app.code(), "{}", msg),
        AppError::Unavailable(msg) => warn!(code = app.code(), "{}", msg),
        _ => {}
    }
    app
}

/// Map a domain result into the response body, classifying the error.
pub fn to_json<T: Serialize>(result: Result<T>) -> Result<Json<T>, AppError> {
    result.map(Json).map_err(report)
}

/// Calls without a payload answer `{}`.
pub fn to_empty(result: Result<()>) -> Result<Json<Value>, AppError> {
    result.map(|_| Json(json!({}))).map_err(report)
}

/// Run the declarative checks of a request before it reaches a service.
pub fn validated<T: Validate>(value: T) -> Result<T, AppError> {
    value
        .validate()
        .map_err(|e| AppError::InvalidArgument(e.to_string()))?;
    Ok(value)
}
