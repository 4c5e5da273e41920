use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorReport, ServiceError};

/// Body of every successful response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Response {
        Self::with_status(StatusCode::CREATED, data)
    }

    fn with_status(status: StatusCode, data: T) -> Response {
        (
            status,
            Json(ApiResponse {
                success: true,
                data,
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// The request body could not be parsed.
    Body(JsonRejection),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, report) = match &self {
            ApiError::Service(err) => {
                let status = err.status_code();
                (
                    status,
                    err.public_message(),
                    ErrorReport::from_error("infra::http::api", status, err),
                )
            }
            ApiError::Body(rejection) => (
                StatusCode::BAD_REQUEST,
                rejection.body_text(),
                ErrorReport::from_message(
                    "infra::http::api::body",
                    StatusCode::BAD_REQUEST,
                    rejection.body_text(),
                ),
            ),
        };

        let body = ApiErrorBody {
            success: false,
            message,
        };
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
