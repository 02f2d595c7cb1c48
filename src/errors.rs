use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::core::client::prometheus_client::MetricsError;
use crate::core::util::sort::SortError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    ResourceExhausted(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Stable kind code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unavailable(_) => "UNAVAILABLE",
            AppError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Shorthand for returning an `InvalidArgument` from a service.
pub fn invalid_argument(msg: impl Into<String>) -> anyhow::Error {
    AppError::InvalidArgument(msg.into()).into()
}

/// Classify an `anyhow::Error` coming out of a service into an `AppError`.
///
/// Typed errors keep their kind; Kubernetes API responses are mapped by status code;
/// anything unrecognised is internal.
pub fn classify(err: anyhow::Error) -> AppError {
    let err = match err.downcast::<AppError>() {
        Ok(app) => return app,
        Err(other) => other,
    };

    if let Some(metrics) = err.downcast_ref::<MetricsError>() {
        return if metrics.is_unavailable() {
            AppError::Unavailable(metrics.to_string())
        } else {
            AppError::Internal(metrics.to_string())
        };
    }

    if let Some(sort) = err.downcast_ref::<SortError>() {
        return AppError::Internal(sort.to_string());
    }

    if let Some(kube_err) = err.downcast_ref::<kube::Error>() {
        return match kube_err {
            kube::Error::Api(resp) => {
                let message = kube_err.to_string();
                match http::StatusCode::from_u16(resp.code).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR) {
                    http::StatusCode::NOT_FOUND => AppError::NotFound(message),
                    http::StatusCode::CONFLICT => AppError::Conflict(message),
                    http::StatusCode::BAD_REQUEST | http::StatusCode::UNPROCESSABLE_ENTITY => {
                        AppError::InvalidArgument(message)
                    }
                    http::StatusCode::TOO_MANY_REQUESTS => AppError::ResourceExhausted(message),
                    s if s.is_server_error() => AppError::Unavailable(message),
                    _ => AppError::Internal(message),
                }
            }
            _ => AppError::Unavailable(kube_err.to_string()),
        };
    }

    AppError::Internal(format!("{:#}", err))
}

/// True when the error is a Kubernetes 404.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<kube::Error>() {
        Some(kube::Error::Api(resp)) => resp.code == 404,
        _ => matches!(err.downcast_ref::<AppError>(), Some(AppError::NotFound(_))),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        // No stack traces, only the kind code and the rendered message
        let body = Json(json!({
            "code": self.code(),
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}
