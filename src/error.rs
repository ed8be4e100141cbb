use std::convert::Infallible;

use serde_json::json;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::db::StoreError;

pub const UPLOAD_TOO_LARGE: &str =
    "File too large. Maximum size is 1GB for videos and 10MB for images.";

/// Errors surfaced to HTTP clients as `{success: false, message}` envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        detail: Option<String>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{message}")]
    Internal {
        message: String,
        detail: Option<String>,
    },
}

impl warp::reject::Reject for ApiError {}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            detail: None,
        }
    }

    pub fn internal(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Maps a store failure, using `context` as the message for validation errors.
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |err| match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Validation(detail) => ApiError::BadRequest {
                message: context.to_owned(),
                detail: Some(detail),
            },
            StoreError::FullyGrown => ApiError::bad_request(err.to_string()),
        }
    }

    /// Map to HTTP status code.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ApiError::BadRequest {
                detail: Some(detail),
                ..
            }
            | ApiError::Internal {
                detail: Some(detail),
                ..
            } => json!({ "success": false, "message": self.to_string(), "error": detail }),
            _ => json!({ "success": false, "message": self.to_string() }),
        }
    }
}

fn envelope(status: StatusCode, body: serde_json::Value) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

/// Turns every rejection into the JSON envelope the front end expects.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    // Handler rejections win over whatever the other branches of the route tree
    // rejected with.
    if let Some(e) = err.find::<ApiError>() {
        if let ApiError::Internal { detail, .. } = e {
            error!("{}: {}", e, detail.as_deref().unwrap_or("-"));
        }
        return Ok(envelope(e.status(), e.body()));
    }

    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(envelope(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": "Invalid request body", "error": e.to_string() }),
        ));
    }

    if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        return Ok(envelope(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": "Invalid query parameters", "error": e.to_string() }),
        ));
    }

    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(envelope(
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "success": false, "message": UPLOAD_TOO_LARGE }),
        ));
    }

    if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
        return Ok(envelope(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "success": false, "message": e.to_string() }),
        ));
    }

    if let Some(e) = err.find::<warp::reject::LengthRequired>() {
        return Ok(envelope(
            StatusCode::LENGTH_REQUIRED,
            json!({ "success": false, "message": e.to_string() }),
        ));
    }

    if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        return Ok(envelope(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": e.to_string() }),
        ));
    }

    if let Some(e) = err.find::<warp::reject::MissingHeader>() {
        warn!("rejected request: {}", e);
        return Ok(envelope(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": e.to_string() }),
        ));
    }

    // a path that exists under another method is still an unknown route
    if err.is_not_found() || err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(envelope(
            StatusCode::NOT_FOUND,
            json!({ "success": false, "message": "Route not found" }),
        ));
    }

    error!("unhandled rejection: {:?}", err);
    Ok(envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "success": false, "message": "Something went wrong!" }),
    ))
}
