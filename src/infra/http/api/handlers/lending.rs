//! Borrow and return, addressed as the student's book set.

use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::infra::http::api::error::{ApiError, ApiResponse};
use crate::infra::http::api::state::HttpState;

pub async fn borrow_book(
    State(state): State<HttpState>,
    Path((student_id, book_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let receipt = state.services.lending.borrow(student_id, book_id).await?;
    Ok(ApiResponse::ok(receipt.student))
}

pub async fn return_book(
    State(state): State<HttpState>,
    Path((student_id, book_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let receipt = state
        .services
        .lending
        .return_book(student_id, book_id)
        .await?;
    Ok(ApiResponse::ok(receipt.student))
}
